// flowrig/src/execution/pool.rs

//! Bounded worker pool shared by every run of one executor.
//!
//! Branch tasks are spawned freely; what the pool bounds is the number of
//! unit lifecycles running on those tasks at once. A branch waiting for a
//! nested group holds no permit, so nesting cannot starve the pool.

use crate::error::FlowError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{event, instrument, Level};

#[derive(Debug)]
pub struct WorkerPool {
  size: usize,
  permits: Arc<Semaphore>,
  tracker: TaskTracker,
  shutdown: CancellationToken,
}

impl WorkerPool {
  /// A pool running at most `size` unit lifecycles concurrently (minimum 1).
  pub fn new(size: usize) -> Self {
    let size = size.max(1);
    Self {
      size,
      permits: Arc::new(Semaphore::new(size)),
      tracker: TaskTracker::new(),
      shutdown: CancellationToken::new(),
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn available_permits(&self) -> usize {
    self.permits.available_permits()
  }

  /// Branch tasks spawned and not yet finished.
  pub fn in_flight(&self) -> usize {
    self.tracker.len()
  }

  pub fn is_shut_down(&self) -> bool {
    self.tracker.is_closed()
  }

  /// Spawns a tracked task. The task yields `None` if the pool is force-cancelled under it.
  pub(crate) fn spawn<F>(&self, task: F) -> Result<JoinHandle<Option<F::Output>>, FlowError>
  where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
  {
    if self.tracker.is_closed() {
      return Err(closed());
    }
    let token = self.shutdown.clone();
    Ok(self.tracker.spawn(async move {
      tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = task => Some(output),
      }
    }))
  }

  /// Waits for a lifecycle permit.
  pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, FlowError> {
    if self.shutdown.is_cancelled() {
      return Err(closed());
    }
    tokio::select! {
      biased;
      _ = self.shutdown.cancelled() => Err(closed()),
      permit = Arc::clone(&self.permits).acquire_owned() => permit.map_err(|_| closed()),
    }
  }

  /// Closes the pool to new work and drains in-flight tasks for up to
  /// `grace`, then cancels whatever is left.
  ///
  /// Returns `true` when every task finished within the grace period.
  #[instrument(name = "WorkerPool::shutdown", skip(self), fields(in_flight = self.tracker.len()))]
  pub async fn shutdown(&self, grace: Duration) -> bool {
    self.tracker.close();
    let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
    if drained {
      event!(Level::DEBUG, "Worker pool drained.");
    } else {
      event!(Level::WARN, remaining = self.tracker.len(), "Grace period elapsed; cancelling remaining branch tasks.");
      self.shutdown.cancel();
      self.tracker.wait().await;
    }
    self.permits.close();
    drained
  }
}

fn closed() -> FlowError {
  FlowError::Interrupted {
    reason: "worker pool is shut down".to_string(),
  }
}
