//! Local-first sync core for esports match, event and news data.
//!
//! Fetched entities are persisted in a SQLite-backed [`store::EntityStore`].
//! Consumers read through long-lived cached views and ask for fresh data
//! through refresh actions on the [`sync::SyncCoordinator`]; followed
//! entities are tracked by the [`topics::TopicTracker`].

pub mod config;
pub mod error;
pub mod logging;
pub mod state;
pub mod store;
pub mod sync;
pub mod topics;
pub mod vlr;

#[cfg(test)]
mod test_support;
