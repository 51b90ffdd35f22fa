//! Fixtures and scripted fakes shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{BridgeError, FetchError};
use crate::store::{EntityStore, SqliteStorage};
use crate::topics::NotificationBridge;
use crate::vlr::types::{
  EventMatch, MatchDetails, MatchEventInfo, MatchPreview, MatchTeam, NewsItem, TeamSummary,
  TournamentDetails, TournamentPreview,
};
use crate::vlr::RemoteFetcher;

pub(crate) fn memory_store() -> EntityStore {
  EntityStore::new(SqliteStorage::open_in_memory().unwrap())
}

fn team(name: &str) -> TeamSummary {
  TeamSummary {
    name: name.to_string(),
    score: None,
  }
}

pub(crate) fn match_preview(id: &str, status: &str) -> MatchPreview {
  MatchPreview {
    id: id.to_string(),
    status: status.to_string(),
    scheduled_at: None,
    event: "Champions Tour".to_string(),
    series: "Playoffs".to_string(),
    team1: team("Alpha"),
    team2: team("Bravo"),
  }
}

pub(crate) fn news_item(id: &str, title: &str) -> NewsItem {
  NewsItem {
    id: id.to_string(),
    title: title.to_string(),
    description: None,
    author: Some("staff".to_string()),
    url: format!("https://news.example.com/{}", id),
    published_at: None,
  }
}

pub(crate) fn tournament_preview(id: &str, status: &str) -> TournamentPreview {
  TournamentPreview {
    id: id.to_string(),
    title: format!("Event {}", id),
    status: status.to_string(),
    dates: "Jan 1 - Jan 7".to_string(),
    location: "Online".to_string(),
    prize: "$10,000".to_string(),
    img: None,
  }
}

pub(crate) fn event_match(id: &str, status: &str, round: &str, stage: &str) -> EventMatch {
  EventMatch {
    id: id.to_string(),
    status: status.to_string(),
    round: round.to_string(),
    stage: stage.to_string(),
    date: None,
    time: None,
    team1: team("Alpha"),
    team2: team("Bravo"),
  }
}

pub(crate) fn tournament_details(id: &str, matches: Vec<EventMatch>) -> TournamentDetails {
  TournamentDetails {
    id: id.to_string(),
    title: format!("Event {}", id),
    subtitle: None,
    status: "ongoing".to_string(),
    dates: "Jan 1 - Jan 7".to_string(),
    prize: "$10,000".to_string(),
    location: "Online".to_string(),
    img: None,
    participants: vec![],
    matches,
  }
}

pub(crate) fn match_details(id: &str) -> MatchDetails {
  MatchDetails {
    id: id.to_string(),
    event: MatchEventInfo {
      series: "Champions Tour".to_string(),
      stage: "Playoffs".to_string(),
      date: None,
      patch: None,
    },
    teams: vec![
      MatchTeam {
        id: None,
        name: "Alpha".to_string(),
        score: Some(2),
      },
      MatchTeam {
        id: None,
        name: "Bravo".to_string(),
        score: Some(1),
      },
    ],
    maps: vec![],
  }
}

pub(crate) fn not_found() -> FetchError {
  FetchError::Response {
    status: 404,
    message: "not found".to_string(),
  }
}

/// Remote fetcher with scripted responses.
///
/// Lists default to empty; details default to 404. When gated, every call
/// waits for a permit on the gate before answering.
#[derive(Default)]
pub(crate) struct FakeFetcher {
  events: Mutex<Option<Result<Vec<TournamentPreview>, FetchError>>>,
  event_details: Mutex<HashMap<String, Result<TournamentDetails, FetchError>>>,
  matches: Mutex<Option<Result<Vec<MatchPreview>, FetchError>>>,
  match_details: Mutex<HashMap<String, Result<MatchDetails, FetchError>>>,
  news: Mutex<Option<Result<Vec<NewsItem>, FetchError>>>,
  calls: Mutex<HashMap<&'static str, usize>>,
  gate: Option<Arc<Semaphore>>,
}

impl FakeFetcher {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// A fetcher whose calls block until the returned semaphore gets permits.
  pub(crate) fn gated() -> (Self, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = Self {
      gate: Some(Arc::clone(&gate)),
      ..Self::default()
    };
    (fetcher, gate)
  }

  pub(crate) fn set_events(&self, result: Result<Vec<TournamentPreview>, FetchError>) {
    *self.events.lock().unwrap() = Some(result);
  }

  pub(crate) fn set_event_details(&self, id: &str, result: Result<TournamentDetails, FetchError>) {
    self.event_details.lock().unwrap().insert(id.to_string(), result);
  }

  pub(crate) fn set_matches(&self, result: Result<Vec<MatchPreview>, FetchError>) {
    *self.matches.lock().unwrap() = Some(result);
  }

  pub(crate) fn set_match_details(&self, id: &str, result: Result<MatchDetails, FetchError>) {
    self.match_details.lock().unwrap().insert(id.to_string(), result);
  }

  pub(crate) fn set_news(&self, result: Result<Vec<NewsItem>, FetchError>) {
    *self.news.lock().unwrap() = Some(result);
  }

  /// How many times the named fetch has been called.
  pub(crate) fn calls(&self, name: &str) -> usize {
    self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
  }

  async fn enter(&self, name: &'static str) {
    *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
    if let Some(gate) = &self.gate {
      gate.acquire().await.unwrap().forget();
    }
  }
}

fn scripted<T: Clone>(slot: &Mutex<Option<Result<Vec<T>, FetchError>>>) -> Result<Vec<T>, FetchError> {
  slot.lock().unwrap().clone().unwrap_or_else(|| Ok(vec![]))
}

#[async_trait]
impl RemoteFetcher for FakeFetcher {
  async fn fetch_events(&self) -> Result<Vec<TournamentPreview>, FetchError> {
    self.enter("events").await;
    scripted(&self.events)
  }

  async fn fetch_event_details(&self, id: &str) -> Result<TournamentDetails, FetchError> {
    self.enter("event_details").await;
    let scripted = self.event_details.lock().unwrap().get(id).cloned();
    scripted.unwrap_or_else(|| Err(not_found()))
  }

  async fn fetch_matches(&self) -> Result<Vec<MatchPreview>, FetchError> {
    self.enter("matches").await;
    scripted(&self.matches)
  }

  async fn fetch_match_details(&self, id: &str) -> Result<MatchDetails, FetchError> {
    self.enter("match_details").await;
    let scripted = self.match_details.lock().unwrap().get(id).cloned();
    scripted.unwrap_or_else(|| Err(not_found()))
  }

  async fn fetch_news(&self) -> Result<Vec<NewsItem>, FetchError> {
    self.enter("news").await;
    scripted(&self.news)
  }
}

/// Notification bridge that records calls and can be told to fail.
#[derive(Default)]
pub(crate) struct FakeBridge {
  fail: AtomicBool,
  delay: Option<Duration>,
  subscribes: AtomicUsize,
  unsubscribes: AtomicUsize,
  log: Mutex<Vec<String>>,
}

impl FakeBridge {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// A bridge that takes `delay` to answer every call.
  pub(crate) fn slow(delay: Duration) -> Self {
    Self {
      delay: Some(delay),
      ..Self::default()
    }
  }

  pub(crate) fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  pub(crate) fn subscribes(&self) -> usize {
    self.subscribes.load(Ordering::SeqCst)
  }

  pub(crate) fn unsubscribes(&self) -> usize {
    self.unsubscribes.load(Ordering::SeqCst)
  }

  /// Calls in the order they completed, as "+topic" or "-topic".
  pub(crate) fn log(&self) -> Vec<String> {
    self.log.lock().unwrap().clone()
  }
}

#[async_trait]
impl NotificationBridge for FakeBridge {
  async fn subscribe_topic(&self, topic: &str) -> Result<(), BridgeError> {
    self.subscribes.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail.load(Ordering::SeqCst) {
      return Err(BridgeError::Subscribe {
        topic: topic.to_string(),
        message: "bridge unavailable".to_string(),
      });
    }
    self.log.lock().unwrap().push(format!("+{}", topic));
    Ok(())
  }

  async fn unsubscribe_topic(&self, topic: &str) -> Result<(), BridgeError> {
    self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail.load(Ordering::SeqCst) {
      return Err(BridgeError::Unsubscribe {
        topic: topic.to_string(),
        message: "bridge unavailable".to_string(),
      });
    }
    self.log.lock().unwrap().push(format!("-{}", topic));
    Ok(())
  }
}

/// Serve a single canned HTTP response.
///
/// Returns the base url (with an `/api/v1/` path) and a handle resolving to
/// the request line that was received.
pub(crate) async fn serve_once(
  status: &'static str,
  body: &'static str,
  delay: Duration,
) -> (String, tokio::task::JoinHandle<String>) {
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();

  let handle = tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
      let n = socket.read(&mut buf).await.unwrap();
      if n == 0 {
        break;
      }
      request.extend_from_slice(&buf[..n]);
    }

    tokio::time::sleep(delay).await;
    let response = format!(
      "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
      status,
      body.len(),
      body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;

    let text = String::from_utf8_lossy(&request).to_string();
    text.lines().next().unwrap_or_default().to_string()
  });

  (format!("http://{}/api/v1/", addr), handle)
}
