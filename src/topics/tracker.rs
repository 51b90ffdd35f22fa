use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::TopicError;
use crate::store::{EntityStore, SqliteStorage, Storage};

use super::bridge::NotificationBridge;

/// Durable set of followed topics, kept in step with the push bridge.
///
/// Every change goes to the bridge first and is recorded locally only after
/// the bridge accepted it. Calls for the same topic are serialized; calls for
/// different topics run independently.
pub struct TopicTracker<S: Storage = SqliteStorage> {
  bridge: Arc<dyn NotificationBridge>,
  store: EntityStore<S>,
  watchers: Arc<Mutex<HashMap<String, watch::Sender<Option<bool>>>>>,
  locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl<S: Storage> TopicTracker<S> {
  pub fn new(bridge: Arc<dyn NotificationBridge>, store: EntityStore<S>) -> Self {
    Self {
      bridge,
      store,
      watchers: Arc::new(Mutex::new(HashMap::new())),
      locks: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Membership of `topic`, updated after every successful change.
  ///
  /// `None` means membership could not be read from the store.
  pub fn is_subscribed(&self, topic: &str) -> watch::Receiver<Option<bool>> {
    let mut watchers = lock(&self.watchers);
    watchers.retain(|_, tx| tx.receiver_count() > 0);

    if let Some(tx) = watchers.get(topic) {
      if tx.borrow().is_none() {
        tx.send_replace(self.read_membership(topic));
      }
      return tx.subscribe();
    }

    let (tx, rx) = watch::channel(self.read_membership(topic));
    watchers.insert(topic.to_string(), tx);
    rx
  }

  /// Follow `topic`. Succeeds without contacting the bridge if already followed.
  pub async fn subscribe(&self, topic: &str) -> Result<(), TopicError> {
    let topic_lock = self.topic_lock(topic);
    let _guard = topic_lock.lock().await;
    self.apply(topic, true).await
  }

  /// Stop following `topic`. Succeeds without contacting the bridge if not followed.
  pub async fn unsubscribe(&self, topic: &str) -> Result<(), TopicError> {
    let topic_lock = self.topic_lock(topic);
    let _guard = topic_lock.lock().await;
    self.apply(topic, false).await
  }

  /// Flip membership of `topic`, returning the new membership.
  pub async fn toggle(&self, topic: &str) -> Result<bool, TopicError> {
    let topic_lock = self.topic_lock(topic);
    let _guard = topic_lock.lock().await;

    let want = !self.stored_membership(topic)?;
    self.apply(topic, want).await?;
    Ok(want)
  }

  /// Every followed topic, oldest first.
  pub fn tracked(&self) -> Result<Vec<String>, TopicError> {
    self
      .store
      .topics()
      .map_err(|e| TopicError::Store(e.to_string()))
  }

  /// Move `topic` to the wanted membership. Caller holds the topic lock.
  async fn apply(&self, topic: &str, want: bool) -> Result<(), TopicError> {
    if self.stored_membership(topic)? == want {
      debug!(topic, subscribed = want, "topic already in requested state");
      self.publish(topic, want);
      return Ok(());
    }

    let pushed = if want {
      self.bridge.subscribe_topic(topic).await
    } else {
      self.bridge.unsubscribe_topic(topic).await
    };
    if let Err(e) = pushed {
      warn!(topic, error = %e, "push bridge rejected topic change");
      return Err(e.into());
    }

    let recorded = if want {
      self.store.insert_topic(topic)
    } else {
      self.store.remove_topic(topic)
    };
    if let Err(e) = recorded {
      error!(topic, error = %e, "failed to record topic change, reverting bridge call");
      let reverted = if want {
        self.bridge.unsubscribe_topic(topic).await
      } else {
        self.bridge.subscribe_topic(topic).await
      };
      if let Err(revert_err) = reverted {
        error!(topic, error = %revert_err, "failed to revert bridge call");
      }
      return Err(TopicError::Store(e.to_string()));
    }

    info!(topic, subscribed = want, "topic membership changed");
    self.publish(topic, want);
    Ok(())
  }

  fn stored_membership(&self, topic: &str) -> Result<bool, TopicError> {
    self
      .store
      .has_topic(topic)
      .map_err(|e| TopicError::Store(e.to_string()))
  }

  fn read_membership(&self, topic: &str) -> Option<bool> {
    match self.store.has_topic(topic) {
      Ok(subscribed) => Some(subscribed),
      Err(e) => {
        error!(topic, error = %e, "failed to read topic membership");
        None
      }
    }
  }

  fn publish(&self, topic: &str, subscribed: bool) {
    if let Some(tx) = lock(&self.watchers).get(topic) {
      tx.send_if_modified(|current| {
        let changed = *current != Some(subscribed);
        *current = Some(subscribed);
        changed
      });
    }
  }

  fn topic_lock(&self, topic: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = lock(&self.locks);
    // Only the map holds locks nobody is waiting on
    locks.retain(|_, l| Arc::strong_count(l) > 1);
    Arc::clone(locks.entry(topic.to_string()).or_default())
  }
}

impl<S: Storage> Clone for TopicTracker<S> {
  fn clone(&self) -> Self {
    Self {
      bridge: Arc::clone(&self.bridge),
      store: self.store.clone(),
      watchers: Arc::clone(&self.watchers),
      locks: Arc::clone(&self.locks),
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
