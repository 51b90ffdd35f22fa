//! Sync coordinator: cached views plus refresh actions per resource.

use color_eyre::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

use crate::error::FetchError;
use crate::store::{CachedView, EntityKind, EntityStore, Record};
use crate::vlr::types::{
  EventBuckets, MatchDetails, MatchGroup, MatchGrouping, MatchPreview, NewsItem,
  TournamentDetails, TournamentPreview,
};
use crate::vlr::RemoteFetcher;

use super::refresh::{Commit, Job, RefreshHandle, RefreshKey, RefreshRegistry};

/// Entry point for consumers of synced data.
///
/// Views read only from the store and never see network state. Refreshes
/// fetch from the remote service and write to the store; consumers observe the
/// result through their views, and the outcome through the refresh status.
///
/// Construct one per process and clone it to every consumer; clones share
/// the store and the in-flight refresh bookkeeping.
#[derive(Clone)]
pub struct SyncCoordinator {
  fetcher: Arc<dyn RemoteFetcher>,
  store: EntityStore,
  refreshes: RefreshRegistry,
}

impl SyncCoordinator {
  pub fn new(fetcher: Arc<dyn RemoteFetcher>, store: EntityStore) -> Self {
    Self {
      fetcher,
      store,
      refreshes: RefreshRegistry::default(),
    }
  }

  #[cfg(test)]
  pub(crate) fn store(&self) -> &EntityStore {
    &self.store
  }

  // Events

  pub fn observe_events(&self) -> CachedView<Vec<TournamentPreview>> {
    self.store.observe_all()
  }

  /// Events split into ongoing, upcoming and completed.
  pub fn observe_event_buckets(&self) -> CachedView<EventBuckets> {
    let store = self.store.clone();
    self
      .store
      .observe_kind_with(EntityKind::TournamentPreview, move || {
        Ok(EventBuckets::from_events(store.get_all()?))
      })
  }

  pub fn observe_event_details(&self, id: &str) -> CachedView<Option<TournamentDetails>> {
    self.store.observe(id)
  }

  /// An event's matches grouped by `by`, regrouped on every store change.
  pub fn observe_event_matches(
    &self,
    id: &str,
    by: MatchGrouping,
  ) -> CachedView<Option<Vec<MatchGroup>>> {
    let store = self.store.clone();
    let key = id.to_string();
    self
      .store
      .observe_key_with(EntityKind::TournamentDetails, id, move || {
        let details = store.get::<TournamentDetails>(&key)?;
        Ok(details.map(|d| d.group_matches(by)))
      })
  }

  pub fn refresh_events(&self) -> RefreshHandle {
    let fetcher = Arc::clone(&self.fetcher);
    self.refresh(RefreshKey::kind(EntityKind::TournamentPreview), move || {
      let fetcher = Arc::clone(&fetcher);
      async move { fetcher.fetch_events().await }.boxed()
    })
  }

  pub fn refresh_event_details(&self, id: &str) -> RefreshHandle {
    let fetcher = Arc::clone(&self.fetcher);
    let owned_id = id.to_string();
    self.refresh(
      RefreshKey::record(EntityKind::TournamentDetails, id),
      move || {
        let fetcher = Arc::clone(&fetcher);
        let id = owned_id.clone();
        async move {
          let details = fetcher.fetch_event_details(&id).await?;
          expect_id("event details", &id, &details.id)?;
          Ok::<_, FetchError>(vec![details])
        }
        .boxed()
      },
    )
  }

  // Matches

  pub fn observe_matches(&self) -> CachedView<Vec<MatchPreview>> {
    self.store.observe_all()
  }

  /// Matches that have not completed yet, live ones included.
  pub fn observe_upcoming_matches(&self) -> CachedView<Vec<MatchPreview>> {
    self.observe_matches_where(|m| !m.is_completed())
  }

  pub fn observe_completed_matches(&self) -> CachedView<Vec<MatchPreview>> {
    self.observe_matches_where(MatchPreview::is_completed)
  }

  /// One-shot read of at most `limit` upcoming matches.
  pub fn upcoming_matches(&self, limit: usize) -> Result<Vec<MatchPreview>> {
    let matches: Vec<MatchPreview> = self.store.get_all()?;
    Ok(
      matches
        .into_iter()
        .filter(|m| !m.is_completed())
        .take(limit)
        .collect(),
    )
  }

  pub fn observe_match_details(&self, id: &str) -> CachedView<Option<MatchDetails>> {
    self.store.observe(id)
  }

  pub fn refresh_matches(&self) -> RefreshHandle {
    let fetcher = Arc::clone(&self.fetcher);
    self.refresh(RefreshKey::kind(EntityKind::MatchPreview), move || {
      let fetcher = Arc::clone(&fetcher);
      async move { fetcher.fetch_matches().await }.boxed()
    })
  }

  pub fn refresh_match_details(&self, id: &str) -> RefreshHandle {
    let fetcher = Arc::clone(&self.fetcher);
    let owned_id = id.to_string();
    self.refresh(RefreshKey::record(EntityKind::MatchDetails, id), move || {
      let fetcher = Arc::clone(&fetcher);
      let id = owned_id.clone();
      async move {
        let details = fetcher.fetch_match_details(&id).await?;
        expect_id("match details", &id, &details.id)?;
        Ok::<_, FetchError>(vec![details])
      }
      .boxed()
    })
  }

  // News

  pub fn observe_news(&self) -> CachedView<Vec<NewsItem>> {
    self.store.observe_all()
  }

  pub fn refresh_news(&self) -> RefreshHandle {
    let fetcher = Arc::clone(&self.fetcher);
    self.refresh(RefreshKey::kind(EntityKind::News), move || {
      let fetcher = Arc::clone(&fetcher);
      async move { fetcher.fetch_news().await }.boxed()
    })
  }

  fn observe_matches_where(
    &self,
    keep: fn(&MatchPreview) -> bool,
  ) -> CachedView<Vec<MatchPreview>> {
    let store = self.store.clone();
    self
      .store
      .observe_kind_with(EntityKind::MatchPreview, move || {
        let matches: Vec<MatchPreview> = store.get_all()?;
        Ok(matches.into_iter().filter(|m| keep(m)).collect())
      })
  }

  /// Get the refresh handle for `key` and trigger it once.
  ///
  /// `fetch` is only used when no handle for `key` is alive; otherwise the
  /// existing slot, and whatever it has in flight, is shared.
  fn refresh<T, F>(&self, key: RefreshKey, fetch: F) -> RefreshHandle
  where
    T: Record,
    F: Fn() -> BoxFuture<'static, Result<Vec<T>, FetchError>> + Send + Sync + 'static,
  {
    let store = self.store.clone();
    let handle = self.refreshes.handle(key, move || -> Job {
      Arc::new(move || {
        let store = store.clone();
        let fetching = fetch();
        async move {
          let records = fetching.await?;
          let commit: Commit = Box::new(move || store.upsert(&records));
          Ok::<_, FetchError>(commit)
        }
        .boxed()
      })
    });

    handle.trigger();
    handle
  }
}

/// A details payload must describe the record it was requested for.
fn expect_id(what: &'static str, requested: &str, received: &str) -> Result<(), FetchError> {
  if requested == received {
    return Ok(());
  }
  Err(FetchError::Decode {
    what,
    message: format!("requested {} but received {}", requested, received),
  })
}
