//! Tri-state values carried by cached views and refresh status streams.
//!
//! A cached view starts out [`TriState::Waiting`] until its worker has read
//! the store once, then settles on [`TriState::Pass`] for the lifetime of the
//! view. [`TriState::Fail`] is reserved for a malfunctioning store; a missing
//! record or an empty table is still a `Pass`.
//!
//! # Example
//!
//! ```ignore
//! let view = coordinator.observe_matches();
//! match view.current() {
//!     TriState::Waiting => render_spinner(),
//!     TriState::Pass(matches) => render_matches(&matches),
//!     TriState::Fail(e) => render_error(&e),
//! }
//! ```

use crate::error::RefreshError;

/// The state of a cached view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriState<T> {
  /// No value has been produced yet
  Waiting,
  /// Value read from the store, possibly empty or stale
  Pass(T),
  /// The store could not be read
  Fail(String),
}

impl<T> TriState<T> {
  pub fn is_waiting(&self) -> bool {
    matches!(self, TriState::Waiting)
  }

  pub fn is_pass(&self) -> bool {
    matches!(self, TriState::Pass(_))
  }

  pub fn is_fail(&self) -> bool {
    matches!(self, TriState::Fail(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      TriState::Pass(data) => Some(data),
      _ => None,
    }
  }

  pub fn into_data(self) -> Option<T> {
    match self {
      TriState::Pass(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      TriState::Fail(e) => Some(e),
      _ => None,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TriState<U> {
    match self {
      TriState::Waiting => TriState::Waiting,
      TriState::Pass(data) => TriState::Pass(f(data)),
      TriState::Fail(e) => TriState::Fail(e),
    }
  }
}

impl<T> Default for TriState<T> {
  fn default() -> Self {
    TriState::Waiting
  }
}

/// What a refresh status stream carries.
///
/// `Ok(true)` while a fetch is in flight, `Ok(false)` when idle (including
/// after a successful refresh), `Err` after a failed one.
pub type RefreshStatus = Result<bool, RefreshError>;

/// Idle refresh status.
pub const IDLE: RefreshStatus = Ok(false);
