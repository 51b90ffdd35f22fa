//! Long-lived reactive views over the store.

use color_eyre::Result;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::error;

use crate::state::TriState;

/// A continuously updated view of some slice of the store.
///
/// Each view is backed by a worker task that re-reads the store whenever a
/// write touches the observed kind or key, and publishes the result. The
/// worker stops once every clone of the view has been dropped.
#[derive(Debug, Clone)]
pub struct CachedView<T> {
  rx: watch::Receiver<TriState<T>>,
}

impl<T: Clone + Send + Sync + 'static> CachedView<T> {
  /// Spawn the worker for a view.
  ///
  /// `versions` ticks on every write relevant to the view; `read` produces
  /// the snapshot to publish.
  pub(crate) fn spawn<R>(mut versions: watch::Receiver<u64>, read: R) -> Self
  where
    R: Fn() -> Result<T> + Send + 'static,
  {
    let (tx, rx) = watch::channel(TriState::Waiting);

    tokio::spawn(async move {
      loop {
        // Mark seen before reading so a write racing the read triggers another pass
        versions.borrow_and_update();

        let next = match read() {
          Ok(data) => TriState::Pass(data),
          Err(e) => {
            error!(error = %e, "cached view failed to read the store");
            TriState::Fail(e.to_string())
          }
        };

        if tx.send(next).is_err() {
          break;
        }

        tokio::select! {
          changed = versions.changed() => {
            if changed.is_err() {
              break;
            }
          }
          _ = tx.closed() => break,
        }
      }
    });

    Self { rx }
  }

  /// Latest published value.
  pub fn current(&self) -> TriState<T> {
    self.rx.borrow().clone()
  }

  /// Wait for the next published value and return it.
  ///
  /// Returns `None` if the worker has stopped.
  pub async fn next(&mut self) -> Option<TriState<T>> {
    self.rx.changed().await.ok()?;
    Some(self.rx.borrow_and_update().clone())
  }

  /// Wait until the view holds a value matching `pred`, returning it.
  pub async fn wait_for(&mut self, mut pred: impl FnMut(&TriState<T>) -> bool) -> Option<TriState<T>> {
    let value = self.rx.wait_for(|v| pred(v)).await.ok()?;
    Some(value.clone())
  }

  /// Wait for the first value that is not [`TriState::Waiting`].
  pub async fn ready(&mut self) -> Option<TriState<T>> {
    self.wait_for(|v| !v.is_waiting()).await
  }

  /// Stream of values: the current one first, then every change.
  pub fn into_stream(self) -> WatchStream<TriState<T>> {
    WatchStream::new(self.rx)
  }
}
