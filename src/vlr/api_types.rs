//! Serde-deserializable types matching the remote service's responses.
//!
//! These types are separate from domain types to allow lenient
//! deserialization while keeping domain types focused on what the store
//! persists. Conversions fail with [`FetchError::Decode`] when a payload is
//! shaped right but carries unusable values (empty ids, bad timestamps).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::FetchError;

use super::types::{
  EventMatch, MapStats, MapTeamScore, MatchDetails, MatchEventInfo, MatchPreview, MatchTeam,
  NewsItem, Participant, PlayerStats, TeamSummary, TournamentDetails, TournamentPreview,
};

fn decode_error(what: &'static str, message: impl Into<String>) -> FetchError {
  FetchError::Decode {
    what,
    message: message.into(),
  }
}

fn require_id(what: &'static str, id: String) -> Result<String, FetchError> {
  if id.trim().is_empty() {
    return Err(decode_error(what, "missing id"));
  }
  Ok(id)
}

fn parse_timestamp(
  what: &'static str,
  value: Option<String>,
) -> Result<Option<DateTime<Utc>>, FetchError> {
  match value.as_deref().map(str::trim) {
    None | Some("") => Ok(None),
    Some(raw) => DateTime::parse_from_rfc3339(raw)
      .map(|dt| Some(dt.with_timezone(&Utc)))
      .map_err(|e| decode_error(what, format!("invalid timestamp '{}': {}", raw, e))),
  }
}

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTeam {
  #[serde(default)]
  pub id: Option<String>,
  pub name: String,
  #[serde(default)]
  pub score: Option<u32>,
}

impl From<ApiTeam> for TeamSummary {
  fn from(team: ApiTeam) -> Self {
    TeamSummary {
      name: team.name,
      score: team.score,
    }
  }
}

// ============================================================================
// Match list endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatchPreview {
  pub id: String,
  #[serde(default)]
  pub status: String,
  pub time: Option<String>,
  #[serde(default)]
  pub event: String,
  #[serde(default)]
  pub series: String,
  pub team1: ApiTeam,
  pub team2: ApiTeam,
}

impl TryFrom<ApiMatchPreview> for MatchPreview {
  type Error = FetchError;

  fn try_from(api: ApiMatchPreview) -> Result<Self, Self::Error> {
    Ok(MatchPreview {
      id: require_id("match preview", api.id)?,
      status: api.status,
      scheduled_at: parse_timestamp("match preview", api.time)?,
      event: api.event,
      series: api.series,
      team1: api.team1.into(),
      team2: api.team2.into(),
    })
  }
}

// ============================================================================
// Event list and event details endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTournamentPreview {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub dates: String,
  #[serde(default)]
  pub location: String,
  #[serde(default)]
  pub prize: String,
  pub img: Option<String>,
}

impl TryFrom<ApiTournamentPreview> for TournamentPreview {
  type Error = FetchError;

  fn try_from(api: ApiTournamentPreview) -> Result<Self, Self::Error> {
    Ok(TournamentPreview {
      id: require_id("tournament preview", api.id)?,
      title: api.title,
      status: api.status,
      dates: api.dates,
      location: api.location,
      prize: api.prize,
      img: api.img,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiParticipant {
  pub id: Option<String>,
  pub title: String,
  pub seed: Option<String>,
  pub img: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiEventMatch {
  pub id: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub round: String,
  #[serde(default)]
  pub stage: String,
  pub date: Option<String>,
  pub time: Option<String>,
  pub team1: ApiTeam,
  pub team2: ApiTeam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTournamentDetails {
  pub id: String,
  pub title: String,
  pub subtitle: Option<String>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub dates: String,
  #[serde(default)]
  pub prize: String,
  #[serde(default)]
  pub location: String,
  pub img: Option<String>,
  #[serde(default)]
  pub participants: Vec<ApiParticipant>,
  #[serde(default)]
  pub matches: Vec<ApiEventMatch>,
}

impl TryFrom<ApiTournamentDetails> for TournamentDetails {
  type Error = FetchError;

  fn try_from(api: ApiTournamentDetails) -> Result<Self, Self::Error> {
    let matches = api
      .matches
      .into_iter()
      .map(|game| {
        Ok(EventMatch {
          id: require_id("tournament match", game.id)?,
          status: game.status,
          round: game.round,
          stage: game.stage,
          date: game.date,
          time: game.time,
          team1: game.team1.into(),
          team2: game.team2.into(),
        })
      })
      .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(TournamentDetails {
      id: require_id("tournament details", api.id)?,
      title: api.title,
      subtitle: api.subtitle,
      status: api.status,
      dates: api.dates,
      prize: api.prize,
      location: api.location,
      img: api.img,
      participants: api
        .participants
        .into_iter()
        .map(|p| Participant {
          id: p.id,
          name: p.title,
          seed: p.seed,
          img: p.img,
        })
        .collect(),
      matches,
    })
  }
}

// ============================================================================
// Match details endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiMatchEvent {
  #[serde(default)]
  pub series: String,
  #[serde(default)]
  pub stage: String,
  pub date: Option<String>,
  pub patch: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMapTeam {
  pub name: String,
  pub score: Option<u32>,
  pub score_ct: Option<u32>,
  pub score_t: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPlayer {
  pub name: String,
  #[serde(default)]
  pub team: String,
  #[serde(default)]
  pub agents: Vec<String>,
  pub acs: Option<u32>,
  pub kills: Option<u32>,
  pub deaths: Option<u32>,
  pub assists: Option<u32>,
  pub adr: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMapData {
  pub map: String,
  #[serde(default)]
  pub teams: Vec<ApiMapTeam>,
  #[serde(default)]
  pub members: Vec<ApiPlayer>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMatchDetails {
  pub id: String,
  pub event: ApiMatchEvent,
  #[serde(default)]
  pub teams: Vec<ApiTeam>,
  #[serde(default)]
  pub data: Vec<ApiMapData>,
}

impl TryFrom<ApiMatchDetails> for MatchDetails {
  type Error = FetchError;

  fn try_from(api: ApiMatchDetails) -> Result<Self, Self::Error> {
    Ok(MatchDetails {
      id: require_id("match details", api.id)?,
      event: MatchEventInfo {
        series: api.event.series,
        stage: api.event.stage,
        date: parse_timestamp("match details", api.event.date)?,
        patch: api.event.patch,
      },
      teams: api
        .teams
        .into_iter()
        .map(|t| MatchTeam {
          id: t.id,
          name: t.name,
          score: t.score,
        })
        .collect(),
      maps: api
        .data
        .into_iter()
        .map(|m| MapStats {
          map: m.map,
          teams: m
            .teams
            .into_iter()
            .map(|t| MapTeamScore {
              name: t.name,
              score: t.score,
              score_ct: t.score_ct,
              score_t: t.score_t,
            })
            .collect(),
          players: m
            .members
            .into_iter()
            .map(|p| PlayerStats {
              name: p.name,
              team: p.team,
              agents: p.agents,
              acs: p.acs,
              kills: p.kills,
              deaths: p.deaths,
              assists: p.assists,
              adr: p.adr,
            })
            .collect(),
        })
        .collect(),
    })
  }
}

// ============================================================================
// News endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNewsItem {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub author: Option<String>,
  pub link: String,
  pub date: Option<String>,
}

impl TryFrom<ApiNewsItem> for NewsItem {
  type Error = FetchError;

  fn try_from(api: ApiNewsItem) -> Result<Self, Self::Error> {
    Ok(NewsItem {
      id: require_id("news item", api.id)?,
      title: api.title,
      description: api.description,
      author: api.author,
      url: api.link,
      published_at: parse_timestamp("news item", api.date)?,
    })
  }
}

/// Convert a list of wire items, failing on the first bad one.
pub fn convert_all<A, T>(items: Vec<A>) -> Result<Vec<T>, FetchError>
where
  T: TryFrom<A, Error = FetchError>,
{
  items.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_match_preview_from_json() {
    let json = r#"{
      "id": "m42",
      "status": "LIVE",
      "time": "2024-03-01T18:00:00Z",
      "event": "Champions Tour",
      "series": "Playoffs",
      "team1": { "name": "Alpha", "score": 1 },
      "team2": { "name": "Bravo" }
    }"#;

    let api: ApiMatchPreview = serde_json::from_str(json).unwrap();
    let preview = MatchPreview::try_from(api).unwrap();

    assert_eq!(preview.id, "m42");
    assert!(preview.is_live());
    assert_eq!(preview.team1.score, Some(1));
    assert_eq!(preview.team2.score, None);
    assert_eq!(
      preview.scheduled_at.unwrap().to_rfc3339(),
      "2024-03-01T18:00:00+00:00"
    );
  }

  #[test]
  fn test_bad_timestamp_is_decode_error() {
    let api = ApiNewsItem {
      id: "n1".into(),
      title: "Roster change".into(),
      description: None,
      author: None,
      link: "https://example.com/n1".into(),
      date: Some("yesterday".into()),
    };

    let err = NewsItem::try_from(api).unwrap_err();
    assert!(matches!(err, FetchError::Decode { what: "news item", .. }));
  }

  #[test]
  fn test_empty_id_is_decode_error() {
    let api = ApiTournamentPreview {
      id: "  ".into(),
      title: "Masters".into(),
      status: "upcoming".into(),
      dates: String::new(),
      location: String::new(),
      prize: String::new(),
      img: None,
    };
    assert!(TournamentPreview::try_from(api).is_err());
  }

  #[test]
  fn test_tournament_details_flattens_participants_and_matches() {
    let json = r#"{
      "id": "evt1",
      "title": "Masters",
      "status": "ongoing",
      "participants": [{ "title": "Alpha", "seed": "1" }],
      "matches": [{
        "id": "g1", "status": "live", "round": "Final", "stage": "Playoffs",
        "team1": { "name": "Alpha", "score": 2 },
        "team2": { "name": "Bravo", "score": 1 }
      }]
    }"#;

    let api: ApiTournamentDetails = serde_json::from_str(json).unwrap();
    let details = TournamentDetails::try_from(api).unwrap();

    assert_eq!(details.participants[0].name, "Alpha");
    assert_eq!(details.matches[0].round, "Final");
    assert_eq!(details.matches[0].team1.score, Some(2));
  }

  #[test]
  fn test_match_details_maps_per_map_stats() {
    let json = r#"{
      "id": "m1",
      "event": { "series": "Masters", "stage": "Final", "patch": "8.05" },
      "teams": [{ "id": "t1", "name": "Alpha", "score": 2 }],
      "data": [{
        "map": "Ascent",
        "teams": [{ "name": "Alpha", "score": 13, "scoreCt": 7, "scoreT": 6 }],
        "members": [{ "name": "ace", "team": "Alpha", "agents": ["jett"], "acs": 280, "adr": 171.5 }]
      }]
    }"#;

    let api: ApiMatchDetails = serde_json::from_str(json).unwrap();
    let details = MatchDetails::try_from(api).unwrap();

    assert_eq!(details.event.patch.as_deref(), Some("8.05"));
    assert_eq!(details.maps[0].teams[0].score_ct, Some(7));
    assert_eq!(details.maps[0].players[0].agents, vec!["jett"]);
  }

  #[test]
  fn test_convert_all_fails_on_first_bad_item() {
    let items = vec![
      ApiNewsItem {
        id: "n1".into(),
        title: "ok".into(),
        description: None,
        author: None,
        link: "https://example.com/1".into(),
        date: None,
      },
      ApiNewsItem {
        id: "".into(),
        title: "broken".into(),
        description: None,
        author: None,
        link: "https://example.com/2".into(),
        date: None,
      },
    ];
    let converted: Result<Vec<NewsItem>, _> = convert_all(items);
    assert!(converted.is_err());
  }
}
