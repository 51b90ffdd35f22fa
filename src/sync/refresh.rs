//! Deduplicated, cancellable refresh actions.
//!
//! Every refresh target (a whole kind, or one record of a kind) owns a slot.
//! A slot runs at most one fetch at a time; every [`RefreshHandle`] for the
//! same target shares the slot and its status channel.
//!
//! ```text
//! Idle ──trigger──▶ InFlight ──fetch ok──▶ Settled(Ok)  ──trigger──▶ InFlight ...
//!                      │      ──fetch err─▶ Settled(Err)
//!                      ├──restart──▶ InFlight (new generation, old task aborted)
//!                      └──all handles dropped──▶ Idle
//! ```

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, RefreshError};
use crate::state::{RefreshStatus, IDLE};
use crate::store::EntityKind;

/// What a refresh writes: a whole kind, or one record of a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefreshKey {
  pub kind: EntityKind,
  pub id: Option<String>,
}

impl RefreshKey {
  pub fn kind(kind: EntityKind) -> Self {
    Self { kind, id: None }
  }

  pub fn record(kind: EntityKind, id: &str) -> Self {
    Self {
      kind,
      id: Some(id.to_string()),
    }
  }
}

impl std::fmt::Display for RefreshKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.id {
      Some(id) => write!(f, "{} {}", self.kind, id),
      None => write!(f, "{}", self.kind),
    }
  }
}

/// Writes fetched data to the store, returning how many records changed.
pub(crate) type Commit = Box<dyn FnOnce() -> color_eyre::Result<usize> + Send>;

/// Starts one fetch; called again for every new refresh of the same target.
pub(crate) type Job =
  Arc<dyn Fn() -> BoxFuture<'static, Result<Commit, FetchError>> + Send + Sync>;

enum Phase {
  Idle,
  InFlight { generation: u64, task: JoinHandle<()> },
  Settled(Result<usize, RefreshError>),
}

struct SlotState {
  phase: Phase,
  generation: u64,
}

struct RefreshSlot {
  key: RefreshKey,
  job: Job,
  status: watch::Sender<RefreshStatus>,
  state: Mutex<SlotState>,
}

impl RefreshSlot {
  fn new(key: RefreshKey, job: Job) -> Self {
    Self {
      key,
      job,
      status: watch::channel(IDLE).0,
      state: Mutex::new(SlotState {
        phase: Phase::Idle,
        generation: 0,
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, SlotState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn is_in_flight(&self) -> bool {
    matches!(self.lock().phase, Phase::InFlight { .. })
  }

  /// Start a fetch unless one is already running. Returns whether one started.
  fn trigger(self: &Arc<Self>) -> bool {
    let mut state = self.lock();
    if let Phase::InFlight { generation, .. } = state.phase {
      debug!(key = %self.key, generation, "refresh already in flight");
      return false;
    }
    self.start(&mut state);
    true
  }

  /// Abort any running fetch and start a new one.
  fn restart(self: &Arc<Self>) {
    let mut state = self.lock();
    if let Phase::InFlight { generation, task } = &state.phase {
      debug!(key = %self.key, generation, "superseding in-flight refresh");
      task.abort();
    }
    self.start(&mut state);
  }

  fn start(self: &Arc<Self>, state: &mut SlotState) {
    state.generation += 1;
    let generation = state.generation;
    self.status.send_replace(Ok(true));

    let fetch = (self.job)();
    let slot = Arc::clone(self);
    let task = tokio::spawn(async move {
      let outcome = tokio::select! {
        result = fetch => Some(result),
        // Nobody is watching this target anymore
        _ = slot.status.closed() => None,
      };
      slot.finish(generation, outcome);
    });

    state.phase = Phase::InFlight { generation, task };
  }

  fn finish(&self, generation: u64, outcome: Option<Result<Commit, FetchError>>) {
    let mut state = self.lock();

    // A newer refresh owns the slot; this result must not reach the store
    let current = match state.phase {
      Phase::InFlight { generation: g, .. } => g == generation,
      _ => false,
    };
    if !current {
      debug!(key = %self.key, generation, "discarding superseded refresh result");
      return;
    }

    let settled = match outcome {
      None => {
        debug!(key = %self.key, generation, "refresh abandoned");
        state.phase = Phase::Idle;
        self.status.send_replace(IDLE);
        return;
      }
      Some(Ok(commit)) => match commit() {
        Ok(written) => {
          info!(key = %self.key, written, "refresh applied");
          self.status.send_replace(IDLE);
          Ok(written)
        }
        Err(e) => {
          error!(key = %self.key, error = %e, "failed to persist refreshed data");
          let err = RefreshError::Store(e.to_string());
          self.status.send_replace(Err(err.clone()));
          Err(err)
        }
      },
      Some(Err(e)) => {
        warn!(key = %self.key, error = %e, "refresh failed");
        let err = RefreshError::from(e);
        self.status.send_replace(Err(err.clone()));
        Err(err)
      }
    };

    state.phase = Phase::Settled(settled);
  }

  fn outcome(&self) -> Option<Result<usize, RefreshError>> {
    match &self.lock().phase {
      Phase::Settled(outcome) => Some(outcome.clone()),
      _ => None,
    }
  }
}

/// Slots for every refresh target that currently has handles or a running fetch.
#[derive(Clone, Default)]
pub(crate) struct RefreshRegistry {
  slots: Arc<Mutex<HashMap<RefreshKey, Arc<RefreshSlot>>>>,
}

impl RefreshRegistry {
  /// Get a handle on the slot for `key`, creating the slot with `job` if needed.
  pub(crate) fn handle(&self, key: RefreshKey, job: impl FnOnce() -> Job) -> RefreshHandle {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

    slots.retain(|_, slot| slot.status.receiver_count() > 0 || slot.is_in_flight());

    let slot = Arc::clone(
      slots
        .entry(key.clone())
        .or_insert_with(|| Arc::new(RefreshSlot::new(key, job()))),
    );

    RefreshHandle {
      status: slot.status.subscribe(),
      slot,
    }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.slots.lock().unwrap().len()
  }
}

/// Consumer side of a refresh action.
///
/// Status is `Ok(true)` while a fetch runs, `Ok(false)` when idle or after a
/// successful refresh, and `Err` after a failed one. Refreshed data is never
/// delivered here; it reaches consumers through their cached views.
///
/// Dropping every handle for a target abandons its in-flight fetch.
#[derive(Clone)]
pub struct RefreshHandle {
  slot: Arc<RefreshSlot>,
  status: watch::Receiver<RefreshStatus>,
}

impl RefreshHandle {
  pub fn key(&self) -> &RefreshKey {
    &self.slot.key
  }

  /// Ask for a refresh. No-op while a fetch for the same target is running.
  ///
  /// Returns whether a new fetch was started.
  pub fn trigger(&self) -> bool {
    self.slot.trigger()
  }

  /// Start a new fetch, superseding any running one.
  pub fn restart(&self) {
    self.slot.restart()
  }

  pub fn status(&self) -> RefreshStatus {
    self.status.borrow().clone()
  }

  pub fn is_refreshing(&self) -> bool {
    matches!(*self.status.borrow(), Ok(true))
  }

  /// Outcome of the last completed refresh: records written, or the error.
  pub fn outcome(&self) -> Option<Result<usize, RefreshError>> {
    self.slot.outcome()
  }

  /// Wait for the next status change.
  pub async fn changed(&mut self) -> RefreshStatus {
    // The slot, and with it the sender, lives as long as this handle
    let _ = self.status.changed().await;
    self.status.borrow_and_update().clone()
  }

  /// Wait until no fetch is running and return the resulting status.
  pub async fn settled(&mut self) -> RefreshStatus {
    match self.status.wait_for(|s| !matches!(s, Ok(true))).await {
      Ok(status) => status.clone(),
      Err(_) => IDLE,
    }
  }

  /// Status stream: the current status first, then every change.
  pub fn into_stream(self) -> WatchStream<RefreshStatus> {
    WatchStream::new(self.status)
  }
}

impl std::fmt::Debug for RefreshHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RefreshHandle")
      .field("key", &self.slot.key)
      .field("status", &*self.status.borrow())
      .finish()
  }
}
