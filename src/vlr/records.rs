//! Store implementations for VLR entity types.

use crate::store::{EntityKind, Record};

use super::types::{MatchDetails, MatchPreview, NewsItem, TournamentDetails, TournamentPreview};

impl Record for MatchPreview {
  fn record_key(&self) -> String {
    self.id.clone()
  }

  fn kind() -> EntityKind {
    EntityKind::MatchPreview
  }
}

impl Record for TournamentPreview {
  fn record_key(&self) -> String {
    self.id.clone()
  }

  fn kind() -> EntityKind {
    EntityKind::TournamentPreview
  }
}

impl Record for TournamentDetails {
  fn record_key(&self) -> String {
    self.id.clone()
  }

  fn kind() -> EntityKind {
    EntityKind::TournamentDetails
  }
}

impl Record for MatchDetails {
  fn record_key(&self) -> String {
    self.id.clone()
  }

  fn kind() -> EntityKind {
    EntityKind::MatchDetails
  }
}

impl Record for NewsItem {
  fn record_key(&self) -> String {
    self.id.clone()
  }

  fn kind() -> EntityKind {
    // Articles are immutable once recorded
    EntityKind::News
  }
}
