//! Typed errors surfaced to consumers of the sync layer.
//!
//! Storage internals report `color_eyre` errors; everything that crosses the
//! consumer boundary (refresh status, topic calls) is one of the enums below.
//! They are all `Clone` so they can be carried through `watch` channels.

use thiserror::Error;

/// Failure of a single call to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Network unreachable, connection reset, timeout or unreadable body.
  #[error("transport error: {0}")]
  Transport(String),

  /// The service answered with a non-success status.
  #[error("remote service responded with {status}: {message}")]
  Response { status: u16, message: String },

  /// The payload did not match the expected entity shape.
  #[error("failed to decode {what}: {message}")]
  Decode { what: &'static str, message: String },
}

impl FetchError {
  pub fn is_transport(&self) -> bool {
    matches!(self, FetchError::Transport(_))
  }
}

/// Failure reported by the push-notification transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
  #[error("failed to subscribe to topic {topic}: {message}")]
  Subscribe { topic: String, message: String },

  #[error("failed to unsubscribe from topic {topic}: {message}")]
  Unsubscribe { topic: String, message: String },
}

/// Outcome reported on a refresh status stream when a refresh does not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  /// Fetched data could not be written to the local store.
  #[error("failed to persist refreshed data: {0}")]
  Store(String),
}

/// Failure of a subscribe/unsubscribe call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
  #[error(transparent)]
  Bridge(#[from] BridgeError),

  #[error("failed to update local topic set: {0}")]
  Store(String),
}
