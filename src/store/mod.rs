//! Local-first entity store.
//!
//! This module provides the durable, reactive store the rest of the crate
//! builds on:
//! - One SQLite table per entity kind, keyed by primary key
//! - Replace-on-conflict or keep-first upserts, all-or-nothing per batch
//! - Reactive views that publish the current value and re-publish after
//!   every write touching the observed kind or key
//! - A durable set of subscribed notification topics

mod entity_store;
mod storage;
mod traits;
mod view;

pub use entity_store::EntityStore;
pub use storage::{SqliteStorage, Storage};
pub use traits::{ConflictPolicy, EntityKind, Record};
pub use view::CachedView;
