use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a match as shown in list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
  pub name: String,
  pub score: Option<u32>,
}

/// Match summary for list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPreview {
  pub id: String,
  pub status: String,
  pub scheduled_at: Option<DateTime<Utc>>,
  pub event: String,
  pub series: String,
  pub team1: TeamSummary,
  pub team2: TeamSummary,
}

impl MatchPreview {
  pub fn is_live(&self) -> bool {
    self.status.eq_ignore_ascii_case("live")
  }

  pub fn is_completed(&self) -> bool {
    starts_with_ignore_case(&self.status, "completed")
  }
}

/// Tournament summary for list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentPreview {
  pub id: String,
  pub title: String,
  pub status: String,
  pub dates: String,
  pub location: String,
  pub prize: String,
  pub img: Option<String>,
}

impl TournamentPreview {
  pub fn phase(&self) -> EventPhase {
    EventPhase::from_status(&self.status)
  }
}

/// Where a tournament is in its lifecycle, derived from its status text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
  Ongoing,
  Upcoming,
  /// Anything that is neither ongoing nor upcoming
  Completed,
}

impl EventPhase {
  pub fn from_status(status: &str) -> Self {
    if starts_with_ignore_case(status, "ongoing") {
      EventPhase::Ongoing
    } else if starts_with_ignore_case(status, "upcoming") {
      EventPhase::Upcoming
    } else {
      EventPhase::Completed
    }
  }
}

/// Tournaments split by phase, each bucket in store order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBuckets {
  pub ongoing: Vec<TournamentPreview>,
  pub upcoming: Vec<TournamentPreview>,
  pub completed: Vec<TournamentPreview>,
}

impl EventBuckets {
  pub fn from_events(events: Vec<TournamentPreview>) -> Self {
    let mut buckets = Self::default();
    for event in events {
      match event.phase() {
        EventPhase::Ongoing => buckets.ongoing.push(event),
        EventPhase::Upcoming => buckets.upcoming.push(event),
        EventPhase::Completed => buckets.completed.push(event),
      }
    }
    buckets
  }
}

/// Full tournament details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentDetails {
  pub id: String,
  pub title: String,
  pub subtitle: Option<String>,
  pub status: String,
  pub dates: String,
  pub prize: String,
  pub location: String,
  pub img: Option<String>,
  pub participants: Vec<Participant>,
  pub matches: Vec<EventMatch>,
}

/// Team taking part in a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub id: Option<String>,
  pub name: String,
  pub seed: Option<String>,
  pub img: Option<String>,
}

/// Match entry inside a tournament's schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMatch {
  pub id: String,
  pub status: String,
  pub round: String,
  pub stage: String,
  pub date: Option<String>,
  pub time: Option<String>,
  pub team1: TeamSummary,
  pub team2: TeamSummary,
}

/// Field used to partition a tournament's matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchGrouping {
  Status,
  Round,
  Stage,
}

impl MatchGrouping {
  fn key_of(self, game: &EventMatch) -> &str {
    match self {
      MatchGrouping::Status => &game.status,
      MatchGrouping::Round => &game.round,
      MatchGrouping::Stage => &game.stage,
    }
  }
}

/// Matches sharing the same grouping key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
  pub key: String,
  pub matches: Vec<EventMatch>,
}

impl TournamentDetails {
  /// Partition matches by the given field.
  ///
  /// Groups appear in the order their key is first seen; matches keep their
  /// schedule order within a group. Nothing here is persisted, so callers
  /// recompute it from every fresh read.
  pub fn group_matches(&self, by: MatchGrouping) -> Vec<MatchGroup> {
    let mut groups: Vec<MatchGroup> = Vec::new();

    for game in &self.matches {
      let key = by.key_of(game);
      match groups.iter_mut().find(|g| g.key == key) {
        Some(group) => group.matches.push(game.clone()),
        None => groups.push(MatchGroup {
          key: key.to_string(),
          matches: vec![game.clone()],
        }),
      }
    }

    groups
  }
}

/// Full match details with per-map stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetails {
  pub id: String,
  pub event: MatchEventInfo,
  pub teams: Vec<MatchTeam>,
  pub maps: Vec<MapStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEventInfo {
  pub series: String,
  pub stage: String,
  pub date: Option<DateTime<Utc>>,
  pub patch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTeam {
  pub id: Option<String>,
  pub name: String,
  pub score: Option<u32>,
}

/// Stats for one map of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStats {
  pub map: String,
  pub teams: Vec<MapTeamScore>,
  pub players: Vec<PlayerStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTeamScore {
  pub name: String,
  pub score: Option<u32>,
  pub score_ct: Option<u32>,
  pub score_t: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
  pub name: String,
  pub team: String,
  pub agents: Vec<String>,
  pub acs: Option<u32>,
  pub kills: Option<u32>,
  pub deaths: Option<u32>,
  pub assists: Option<u32>,
  pub adr: Option<f32>,
}

/// News article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub author: Option<String>,
  pub url: String,
  pub published_at: Option<DateTime<Utc>>,
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
  text
    .get(..prefix.len())
    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
