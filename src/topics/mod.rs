//! Push-notification topic subscriptions.
//!
//! A topic is the name the push transport knows an entity by. The tracker
//! keeps the durable set of followed topics in the entity store and mirrors
//! every change to a [`NotificationBridge`].

mod bridge;
mod tracker;

pub use bridge::{HttpBridge, NoopBridge, NotificationBridge};
pub use tracker::TopicTracker;

/// Topic for updates about a tournament.
pub fn event_topic(id: &str) -> String {
  format!("event-{}", id)
}

/// Topic for updates about a single match.
pub fn match_topic(id: &str) -> String {
  format!("match-{}", id)
}
