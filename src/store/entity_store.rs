//! Shared entity store with change notification.

use color_eyre::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

use super::storage::{SqliteStorage, Storage};
use super::traits::{EntityKind, Record};
use super::view::CachedView;

/// Version counters for one entity kind: one for the whole kind, one per
/// key that currently has observers.
#[derive(Default)]
struct KindChannels {
  all: Option<watch::Sender<u64>>,
  keys: HashMap<String, watch::Sender<u64>>,
}

impl KindChannels {
  fn all(&mut self) -> &watch::Sender<u64> {
    self.all.get_or_insert_with(|| watch::channel(0).0)
  }
}

/// Durable store shared by the sync coordinator and the topic tracker.
///
/// Cloning is cheap; every clone refers to the same storage and the same set
/// of observers. Outside this crate the store is read-only:
///
/// ```compile_fail
/// use vlr_sync::store::{EntityStore, SqliteStorage};
/// use vlr_sync::vlr::types::NewsItem;
///
/// let store = EntityStore::new(SqliteStorage::open_in_memory().unwrap());
/// store.upsert::<NewsItem>(&[]).unwrap();
/// ```
pub struct EntityStore<S: Storage = SqliteStorage> {
  storage: Arc<S>,
  channels: Arc<Mutex<HashMap<EntityKind, KindChannels>>>,
}

impl<S: Storage> EntityStore<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      channels: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Write a batch of records and notify observers of every key written.
  ///
  /// Returns how many records were actually written; records dropped by the
  /// kind's conflict policy do not count and do not notify.
  pub(crate) fn upsert<T: Record>(&self, records: &[T]) -> Result<usize> {
    if records.is_empty() {
      return Ok(0);
    }

    let written = self.storage.upsert(records)?;
    debug!(
      kind = %T::kind(),
      offered = records.len(),
      written = written.len(),
      "upserted records"
    );

    if !written.is_empty() {
      self.notify(T::kind(), &written);
    }

    Ok(written.len())
  }

  pub fn get<T: Record>(&self, key: &str) -> Result<Option<T>> {
    self.storage.get(key)
  }

  pub fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    self.storage.get_all()
  }

  /// Observe a single record by key. Absence is `Pass(None)`.
  pub fn observe<T: Record>(&self, key: &str) -> CachedView<Option<T>> {
    let storage = Arc::clone(&self.storage);
    let owned_key = key.to_string();
    self.observe_key_with(T::kind(), key, move || storage.get::<T>(&owned_key))
  }

  /// Observe every record of a kind. An empty table is `Pass(vec![])`.
  pub fn observe_all<T: Record>(&self) -> CachedView<Vec<T>> {
    let storage = Arc::clone(&self.storage);
    self.observe_kind_with(T::kind(), move || storage.get_all::<T>())
  }

  /// Observe a value derived from a whole kind, re-read on every write to it.
  pub fn observe_kind_with<T, R>(&self, kind: EntityKind, read: R) -> CachedView<T>
  where
    T: Clone + Send + Sync + 'static,
    R: Fn() -> Result<T> + Send + 'static,
  {
    CachedView::spawn(self.kind_versions(kind), read)
  }

  /// Observe a value derived from one key, re-read on every write to that key.
  pub fn observe_key_with<T, R>(&self, kind: EntityKind, key: &str, read: R) -> CachedView<T>
  where
    T: Clone + Send + Sync + 'static,
    R: Fn() -> Result<T> + Send + 'static,
  {
    CachedView::spawn(self.key_versions(kind, key), read)
  }

  pub(crate) fn insert_topic(&self, topic: &str) -> Result<bool> {
    self.storage.insert_topic(topic)
  }

  pub(crate) fn remove_topic(&self, topic: &str) -> Result<bool> {
    self.storage.remove_topic(topic)
  }

  pub(crate) fn has_topic(&self, topic: &str) -> Result<bool> {
    self.storage.has_topic(topic)
  }

  pub(crate) fn topics(&self) -> Result<Vec<String>> {
    self.storage.topics()
  }

  fn kind_versions(&self, kind: EntityKind) -> watch::Receiver<u64> {
    let mut channels = self.lock_channels();
    channels.entry(kind).or_default().all().subscribe()
  }

  fn key_versions(&self, kind: EntityKind, key: &str) -> watch::Receiver<u64> {
    let mut channels = self.lock_channels();
    let keys = &mut channels.entry(kind).or_default().keys;
    keys.retain(|_, tx| tx.receiver_count() > 0);
    keys
      .entry(key.to_string())
      .or_insert_with(|| watch::channel(0).0)
      .subscribe()
  }

  fn notify(&self, kind: EntityKind, keys: &[String]) {
    let mut channels = self.lock_channels();
    let entry = channels.entry(kind).or_default();

    for key in keys {
      if let Some(tx) = entry.keys.get(key) {
        tx.send_modify(|v| *v += 1);
      }
    }
    // Forget keys nobody watches anymore
    entry.keys.retain(|_, tx| tx.receiver_count() > 0);

    entry.all().send_modify(|v| *v += 1);
  }

  fn lock_channels(&self) -> std::sync::MutexGuard<'_, HashMap<EntityKind, KindChannels>> {
    self
      .channels
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

impl<S: Storage> Clone for EntityStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      channels: Arc::clone(&self.channels),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::TriState;
  use crate::test_support::{match_preview, memory_store, news_item};
  use crate::vlr::types::{MatchPreview, NewsItem};

  #[tokio::test]
  async fn test_observe_all_starts_with_empty_pass() {
    let store = memory_store();
    let mut view = store.observe_all::<MatchPreview>();

    assert_eq!(view.ready().await.unwrap(), TriState::Pass(vec![]));
  }

  #[tokio::test]
  async fn test_observe_all_follows_upserts() {
    let store = memory_store();
    let mut view = store.observe_all::<MatchPreview>();
    view.ready().await.unwrap();

    store
      .upsert(&[match_preview("m1", "upcoming"), match_preview("m2", "live")])
      .unwrap();

    let state = view
      .wait_for(|v| v.data().is_some_and(|d| d.len() == 2))
      .await
      .unwrap();
    let ids: Vec<_> = state.into_data().unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
  }

  #[tokio::test]
  async fn test_observe_key_sees_last_write() {
    let store = memory_store();
    let mut view = store.observe::<MatchPreview>("m1");
    assert_eq!(view.ready().await.unwrap(), TriState::Pass(None));

    store.upsert(&[match_preview("m1", "upcoming")]).unwrap();
    store.upsert(&[match_preview("m1", "live")]).unwrap();

    let state = view
      .wait_for(|v| matches!(v, TriState::Pass(Some(m)) if m.status == "live"))
      .await
      .unwrap();
    assert!(state.is_pass());
  }

  #[tokio::test]
  async fn test_ignored_news_write_does_not_notify() {
    let store = memory_store();
    store.upsert(&[news_item("n1", "Original")]).unwrap();

    let mut view = store.observe::<NewsItem>("n1");
    view.ready().await.unwrap();

    let written = store.upsert(&[news_item("n1", "Rewritten")]).unwrap();
    assert_eq!(written, 0);

    let no_change =
      tokio::time::timeout(std::time::Duration::from_millis(50), view.next()).await;
    assert!(no_change.is_err(), "a dropped write must not wake observers");
    assert_eq!(view.current().into_data().unwrap().unwrap().title, "Original");
  }

  #[tokio::test]
  async fn test_empty_upsert_is_noop() {
    let store = memory_store();
    assert_eq!(store.upsert::<MatchPreview>(&[]).unwrap(), 0);
  }

  #[tokio::test]
  async fn test_unwatched_keys_are_forgotten() {
    let store = memory_store();
    let view = store.observe::<MatchPreview>("m1");
    drop(view);
    // Give the worker a chance to exit
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    store.upsert(&[match_preview("m1", "live")]).unwrap();

    let channels = store.channels.lock().unwrap();
    assert!(channels[&EntityKind::MatchPreview].keys.is_empty());
  }

  #[tokio::test]
  async fn test_unwatched_keys_are_forgotten_without_writes() {
    let store = memory_store();
    for id in ["m1", "m2", "m3"] {
      drop(store.observe::<MatchPreview>(id));
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let _view = store.observe::<MatchPreview>("m4");

    let channels = store.channels.lock().unwrap();
    let keys: Vec<_> = channels[&EntityKind::MatchPreview].keys.keys().collect();
    assert_eq!(keys, vec!["m4"]);
  }
}
