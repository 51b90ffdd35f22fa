//! Core traits and types for the entity store.

use serde::{de::DeserializeOwned, Serialize};

/// What happens when a record is written under a key that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
  /// The new record fully replaces the stored one
  Replace,
  /// The stored record is kept and the write is dropped
  KeepFirst,
}

/// The fixed set of entity kinds the store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
  MatchPreview,
  TournamentPreview,
  TournamentDetails,
  MatchDetails,
  News,
}

impl EntityKind {
  pub const ALL: [EntityKind; 5] = [
    EntityKind::MatchPreview,
    EntityKind::TournamentPreview,
    EntityKind::TournamentDetails,
    EntityKind::MatchDetails,
    EntityKind::News,
  ];

  /// Table holding records of this kind.
  pub fn table(self) -> &'static str {
    match self {
      EntityKind::MatchPreview => "match_previews",
      EntityKind::TournamentPreview => "tournament_previews",
      EntityKind::TournamentDetails => "tournament_details",
      EntityKind::MatchDetails => "match_details",
      EntityKind::News => "news_items",
    }
  }

  pub fn policy(self) -> ConflictPolicy {
    match self {
      // News is immutable once recorded
      EntityKind::News => ConflictPolicy::KeepFirst,
      _ => ConflictPolicy::Replace,
    }
  }
}

impl std::fmt::Display for EntityKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      EntityKind::MatchPreview => "match preview",
      EntityKind::TournamentPreview => "tournament preview",
      EntityKind::TournamentDetails => "tournament details",
      EntityKind::MatchDetails => "match details",
      EntityKind::News => "news",
    };
    f.write_str(name)
  }
}

/// Trait for entities that can be persisted in the store.
///
/// Implementors provide their primary key and the kind they belong to; the
/// kind decides the table and the conflict policy.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Primary key, unique within the kind (e.g. match id)
  fn record_key(&self) -> String;

  fn kind() -> EntityKind;
}
