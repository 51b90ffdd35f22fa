//! Subcommands and their output.
//!
//! Every read command follows the same pattern: print what the store has,
//! wait for the refresh, and print again only if the refresh wrote something
//! that changed the output.

use clap::{Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;

use vlr_sync::state::TriState;
use vlr_sync::store::CachedView;
use vlr_sync::sync::{RefreshHandle, SyncCoordinator};
use vlr_sync::topics::{event_topic, TopicTracker};
use vlr_sync::vlr::types::{
  EventBuckets, EventPhase, MatchDetails, MatchGrouping, MatchPreview, NewsItem, TeamSummary,
  TournamentDetails, TournamentPreview,
};

/// How long to wait for a view to pick up a refresh that wrote records
const VIEW_CATCH_UP: Duration = Duration::from_secs(2);

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List tournaments by phase
  Events {
    /// Only show tournaments in this phase
    #[arg(long, value_enum)]
    phase: Option<PhaseArg>,
  },
  /// Show a tournament and its schedule
  Event {
    id: String,
    /// How to group the tournament's matches
    #[arg(long, value_enum, default_value_t = GroupArg::Status)]
    group_by: GroupArg,
  },
  /// List matches
  Matches {
    /// Only completed matches
    #[arg(long, conflicts_with = "upcoming")]
    completed: bool,
    /// Only matches that have not completed, live included
    #[arg(long)]
    upcoming: bool,
  },
  /// Show a match with per-map stats
  Match { id: String },
  /// List news articles
  News,
  /// Show the next upcoming matches
  Upcoming {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
  },
  /// Follow a tournament's push notifications
  Follow { event_id: String },
  /// Stop following a tournament
  Unfollow { event_id: String },
  /// List followed topics
  Topics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
  Ongoing,
  Upcoming,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupArg {
  Status,
  Round,
  Stage,
}

impl From<GroupArg> for MatchGrouping {
  fn from(arg: GroupArg) -> Self {
    match arg {
      GroupArg::Status => MatchGrouping::Status,
      GroupArg::Round => MatchGrouping::Round,
      GroupArg::Stage => MatchGrouping::Stage,
    }
  }
}

/// Runs subcommands against the sync layer.
pub struct Runner {
  pub coordinator: SyncCoordinator,
  pub tracker: TopicTracker,
  /// Skip refreshes and show cached data only
  pub offline: bool,
}

impl Runner {
  pub async fn run(&self, command: Command) -> Result<()> {
    let coordinator = &self.coordinator;

    match command {
      Command::Events { phase } => {
        let refresh = || self.refresh(|| coordinator.refresh_events());
        let phase = phase.map(|p| match p {
          PhaseArg::Ongoing => EventPhase::Ongoing,
          PhaseArg::Upcoming => EventPhase::Upcoming,
          PhaseArg::Completed => EventPhase::Completed,
        });
        show(coordinator.observe_event_buckets(), refresh, |b| {
          render_buckets(b, phase)
        })
        .await
      }
      Command::Event { id, group_by } => {
        let refresh = || self.refresh(|| coordinator.refresh_event_details(&id));
        let by = MatchGrouping::from(group_by);
        show(coordinator.observe_event_details(&id), refresh, |d| {
          d.as_ref()
            .map(|details| render_event(details, by))
            .unwrap_or_else(|| format!("No cached data for event {}", id))
        })
        .await
      }
      Command::Matches {
        completed,
        upcoming,
      } => {
        let refresh = || self.refresh(|| coordinator.refresh_matches());
        let view = if completed {
          coordinator.observe_completed_matches()
        } else if upcoming {
          coordinator.observe_upcoming_matches()
        } else {
          coordinator.observe_matches()
        };
        show(view, refresh, |m| render_matches(m)).await
      }
      Command::Match { id } => {
        let refresh = || self.refresh(|| coordinator.refresh_match_details(&id));
        show(coordinator.observe_match_details(&id), refresh, |d| {
          d.as_ref()
            .map(render_match_details)
            .unwrap_or_else(|| format!("No cached data for match {}", id))
        })
        .await
      }
      Command::News => {
        let refresh = || self.refresh(|| coordinator.refresh_news());
        show(coordinator.observe_news(), refresh, |n| render_news(n)).await
      }
      Command::Upcoming { limit } => self.upcoming(limit).await,
      Command::Follow { event_id } => {
        let topic = event_topic(&event_id);
        self
          .tracker
          .subscribe(&topic)
          .await
          .map_err(|e| eyre!("Failed to follow event {}: {}", event_id, e))?;
        println!("Following {}", topic);
        Ok(())
      }
      Command::Unfollow { event_id } => {
        let topic = event_topic(&event_id);
        self
          .tracker
          .unsubscribe(&topic)
          .await
          .map_err(|e| eyre!("Failed to unfollow event {}: {}", event_id, e))?;
        println!("No longer following {}", topic);
        Ok(())
      }
      Command::Topics => {
        let topics = self.tracker.tracked().map_err(|e| eyre!("{}", e))?;
        if topics.is_empty() {
          println!("Not following anything");
        }
        for topic in topics {
          println!("{}", topic);
        }
        Ok(())
      }
    }
  }

  fn refresh(&self, start: impl FnOnce() -> RefreshHandle) -> Option<RefreshHandle> {
    if self.offline {
      None
    } else {
      Some(start())
    }
  }

  /// The widget read: a one-shot list rather than a view.
  async fn upcoming(&self, limit: usize) -> Result<()> {
    let before = self.coordinator.upcoming_matches(limit)?;
    println!("{}", render_matches(&before));

    if let Some(mut refresh) = self.refresh(|| self.coordinator.refresh_matches()) {
      if let Err(e) = refresh.settled().await {
        eprintln!("Refresh failed, showing cached data: {}", e);
        return Ok(());
      }
      let after = self.coordinator.upcoming_matches(limit)?;
      if after != before {
        println!("\n{}", render_matches(&after));
      }
    }

    Ok(())
  }
}

/// Print the view, wait for the refresh and reprint if the store changed.
///
/// The refresh starts only after the first read, so that read is always the
/// cached state.
async fn show<T, R, F>(mut view: CachedView<T>, refresh: R, render: F) -> Result<()>
where
  T: Clone + PartialEq + Send + Sync + 'static,
  R: FnOnce() -> Option<RefreshHandle>,
  F: Fn(&T) -> String,
{
  let first = view
    .ready()
    .await
    .ok_or_else(|| eyre!("Store view closed unexpectedly"))?;
  let first = expect_pass(first)?;
  println!("{}", render(&first));

  let Some(mut refresh) = refresh() else {
    return Ok(());
  };

  if let Err(e) = refresh.settled().await {
    eprintln!("Refresh failed, showing cached data: {}", e);
    return Ok(());
  }

  match refresh.outcome() {
    Some(Ok(written)) if written > 0 => {
      let next = tokio::time::timeout(VIEW_CATCH_UP, view.wait_for(|v| v.data() != Some(&first)))
        .await
        .ok()
        .flatten();
      match next {
        Some(state) => println!("\n{}", render(&expect_pass(state)?)),
        None => debug!(written, "refresh wrote records without changing the output"),
      }
    }
    _ => debug!("refresh wrote nothing new"),
  }

  Ok(())
}

fn expect_pass<T>(state: TriState<T>) -> Result<T> {
  match state {
    TriState::Pass(data) => Ok(data),
    TriState::Fail(e) => Err(eyre!("Failed to read local store: {}", e)),
    TriState::Waiting => Err(eyre!("Store view has no value yet")),
  }
}

fn render_team(team: &TeamSummary) -> String {
  match team.score {
    Some(score) => format!("{} {}", team.name, score),
    None => team.name.clone(),
  }
}

fn render_match(game: &MatchPreview) -> String {
  let when = game
    .scheduled_at
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "TBD".to_string());
  format!(
    "{:<10} {:<12} {:<16} {} vs {}  ({}, {})",
    game.id,
    game.status,
    when,
    render_team(&game.team1),
    render_team(&game.team2),
    game.event,
    game.series
  )
}

fn render_matches(matches: &[MatchPreview]) -> String {
  if matches.is_empty() {
    return "No matches".to_string();
  }
  matches.iter().map(render_match).collect::<Vec<_>>().join("\n")
}

fn render_event_line(event: &TournamentPreview) -> String {
  format!(
    "{:<8} {}  [{}]  {}  {}",
    event.id, event.title, event.status, event.dates, event.prize
  )
}

fn render_buckets(buckets: &EventBuckets, phase: Option<EventPhase>) -> String {
  let sections = [
    (EventPhase::Ongoing, "Ongoing", &buckets.ongoing),
    (EventPhase::Upcoming, "Upcoming", &buckets.upcoming),
    (EventPhase::Completed, "Completed", &buckets.completed),
  ];

  let mut out = Vec::new();
  for (section, title, events) in sections {
    if phase.is_some_and(|p| p != section) {
      continue;
    }
    if phase.is_none() && events.is_empty() {
      continue;
    }
    out.push(format!("{}:", title));
    if events.is_empty() {
      out.push("  (none)".to_string());
    }
    for event in events {
      out.push(format!("  {}", render_event_line(event)));
    }
  }

  if out.is_empty() {
    "No events".to_string()
  } else {
    out.join("\n")
  }
}

fn render_event(details: &TournamentDetails, by: MatchGrouping) -> String {
  let mut out = vec![format!("{} [{}]", details.title, details.status)];
  if let Some(subtitle) = &details.subtitle {
    out.push(subtitle.clone());
  }
  out.push(format!(
    "{} | {} | {}",
    details.dates, details.location, details.prize
  ));
  if !details.participants.is_empty() {
    let teams: Vec<_> = details.participants.iter().map(|p| p.name.as_str()).collect();
    out.push(format!("Teams: {}", teams.join(", ")));
  }

  for group in details.group_matches(by) {
    out.push(format!("\n{}:", group.key));
    for game in group.matches {
      out.push(format!(
        "  {:<10} {} vs {}  ({} / {})",
        game.id,
        render_team(&game.team1),
        render_team(&game.team2),
        game.round,
        game.stage
      ));
    }
  }

  out.join("\n")
}

fn render_match_details(details: &MatchDetails) -> String {
  let teams: Vec<_> = details
    .teams
    .iter()
    .map(|t| match t.score {
      Some(score) => format!("{} {}", t.name, score),
      None => t.name.clone(),
    })
    .collect();

  let mut out = vec![
    teams.join(" vs "),
    format!("{} - {}", details.event.series, details.event.stage),
  ];
  if let Some(patch) = &details.event.patch {
    out.push(format!("Patch {}", patch));
  }

  for map in &details.maps {
    let scores: Vec<_> = map
      .teams
      .iter()
      .map(|t| format!("{} {}", t.name, t.score.map(|s| s.to_string()).unwrap_or_default()))
      .collect();
    out.push(format!("\n{}: {}", map.map, scores.join(" - ")));
    for player in &map.players {
      out.push(format!(
        "  {:<16} {:<8} {}/{}/{}  ACS {}",
        player.name,
        player.team,
        player.kills.unwrap_or(0),
        player.deaths.unwrap_or(0),
        player.assists.unwrap_or(0),
        player.acs.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
      ));
    }
  }

  out.join("\n")
}

fn render_news(news: &[NewsItem]) -> String {
  if news.is_empty() {
    return "No news".to_string();
  }
  news
    .iter()
    .map(|n| match &n.author {
      Some(author) => format!("{} ({})\n  {}", n.title, author, n.url),
      None => format!("{}\n  {}", n.title, n.url),
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::{Arc, Mutex};
  use vlr_sync::error::FetchError;
  use vlr_sync::store::{EntityStore, SqliteStorage};
  use vlr_sync::vlr::types::EventMatch;
  use vlr_sync::vlr::RemoteFetcher;

  /// Serves a single headline; every other resource is empty or missing.
  struct OneHeadline;

  #[async_trait::async_trait]
  impl RemoteFetcher for OneHeadline {
    async fn fetch_events(&self) -> Result<Vec<TournamentPreview>, FetchError> {
      Ok(vec![])
    }

    async fn fetch_event_details(&self, id: &str) -> Result<TournamentDetails, FetchError> {
      Err(FetchError::Response {
        status: 404,
        message: id.to_string(),
      })
    }

    async fn fetch_matches(&self) -> Result<Vec<MatchPreview>, FetchError> {
      Ok(vec![])
    }

    async fn fetch_match_details(&self, id: &str) -> Result<MatchDetails, FetchError> {
      Err(FetchError::Response {
        status: 404,
        message: id.to_string(),
      })
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, FetchError> {
      Ok(vec![NewsItem {
        id: "n1".into(),
        title: "Roster shuffle".into(),
        description: None,
        author: None,
        url: "https://news.example.com/n1".into(),
        published_at: None,
      }])
    }
  }

  fn team(name: &str, score: Option<u32>) -> TeamSummary {
    TeamSummary {
      name: name.to_string(),
      score,
    }
  }

  fn event(id: &str, status: &str) -> TournamentPreview {
    TournamentPreview {
      id: id.to_string(),
      title: format!("Event {}", id),
      status: status.to_string(),
      dates: "Jan 1".to_string(),
      location: "Online".to_string(),
      prize: "$1".to_string(),
      img: None,
    }
  }

  #[test]
  fn test_render_match_with_scores() {
    let game = MatchPreview {
      id: "m1".into(),
      status: "live".into(),
      scheduled_at: None,
      event: "Masters".into(),
      series: "Final".into(),
      team1: team("Alpha", Some(1)),
      team2: team("Bravo", None),
    };

    let line = render_match(&game);
    assert!(line.contains("Alpha 1 vs Bravo"));
    assert!(line.contains("TBD"));
    assert!(line.ends_with("(Masters, Final)"));
  }

  #[test]
  fn test_render_buckets_filters_phase() {
    let buckets = EventBuckets::from_events(vec![event("1", "ongoing"), event("2", "completed")]);

    let all = render_buckets(&buckets, None);
    assert!(all.contains("Ongoing:") && all.contains("Completed:"));
    assert!(!all.contains("Upcoming:"));

    let upcoming = render_buckets(&buckets, Some(EventPhase::Upcoming));
    assert_eq!(upcoming, "Upcoming:\n  (none)");
  }

  #[test]
  fn test_render_event_groups_schedule() {
    let game = |id: &str, status: &str| EventMatch {
      id: id.to_string(),
      status: status.to_string(),
      round: "R1".into(),
      stage: "Groups".into(),
      date: None,
      time: None,
      team1: team("Alpha", None),
      team2: team("Bravo", None),
    };
    let details = TournamentDetails {
      id: "e1".into(),
      title: "Masters".into(),
      subtitle: None,
      status: "ongoing".into(),
      dates: "Jan 1".into(),
      prize: "$1".into(),
      location: "Online".into(),
      img: None,
      participants: vec![],
      matches: vec![game("a", "live"), game("b", "upcoming"), game("c", "live")],
    };

    let out = render_event(&details, MatchGrouping::Status);
    let live = out.find("live:").unwrap();
    let upcoming = out.find("upcoming:").unwrap();
    assert!(live < upcoming);
  }

  #[tokio::test]
  async fn test_show_prints_cache_before_refreshing() {
    let store = EntityStore::new(SqliteStorage::open_in_memory().unwrap());
    let coordinator = SyncCoordinator::new(Arc::new(OneHeadline), store);
    let started = AtomicBool::new(false);
    let printed = Mutex::new(Vec::new());

    let shown = tokio::time::timeout(
      Duration::from_secs(1),
      show(
        coordinator.observe_news(),
        || {
          started.store(true, Ordering::SeqCst);
          Some(coordinator.refresh_news())
        },
        |news: &Vec<NewsItem>| {
          let refreshing = started.load(Ordering::SeqCst);
          printed.lock().unwrap().push((refreshing, news.len()));
          render_news(news)
        },
      ),
    )
    .await;

    shown.expect("reprint should not wait out the catch-up window").unwrap();
    assert_eq!(*printed.lock().unwrap(), vec![(false, 0), (true, 1)]);
  }

  #[test]
  fn test_empty_lists() {
    assert_eq!(render_matches(&[]), "No matches");
    assert_eq!(render_news(&[]), "No news");
    assert_eq!(render_buckets(&EventBuckets::default(), None), "No events");
  }
}
