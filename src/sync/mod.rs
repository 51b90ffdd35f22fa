//! Stale-while-revalidate access to remote data.
//!
//! Consumers hold two independent things per screen: a long-lived
//! [`CachedView`](crate::store::CachedView) that always reflects the store,
//! and a short-lived [`RefreshHandle`] that fetches, writes to the store and
//! reports how that went. A failed refresh never touches the view.

mod coordinator;
mod refresh;

pub use coordinator::SyncCoordinator;
pub use refresh::{RefreshHandle, RefreshKey};
