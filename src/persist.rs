// Debounced, cancellable persistence of the task collection

use crate::error::StorageError;
use crate::models::Task;
use crate::providers::Clock;
use crate::storage::TaskStorage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

/// Quiet period before a burst of mutations is written
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Outcome of the most recent persistence attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PersistStatus {
    /// Nothing scheduled and nothing written yet
    Idle,
    /// A write is waiting for the quiet period to end
    Pending,
    Saved { tasks: usize, at: DateTime<Utc> },
    Failed { error: String },
}

impl PersistStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PersistStatus::Failed { .. })
    }
}

/// Trailing-edge debounce around `TaskStorage::write_tasks`.
///
/// Every `schedule` cancels the pending timer and starts a new one holding the
/// latest full snapshot, so only the last snapshot of a burst is written.
/// Cancelling only stops a write that is still waiting; a write already handed
/// to storage runs to completion. Each write waits for the one before it, so
/// writes reach storage one at a time and in scheduling order.
/// Must be used from inside a tokio runtime.
pub struct PersistScheduler {
    storage: Arc<dyn TaskStorage>,
    clock: Arc<dyn Clock>,
    delay: Duration,
    pending: Option<PendingWrite>,
    status: Arc<watch::Sender<PersistStatus>>,
}

struct PendingWrite {
    handle: JoinHandle<()>,
    cancel: Option<oneshot::Sender<()>>,
}

impl PendingWrite {
    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // The timer may already have fired; then there is no one to tell
            let _ = cancel.send(());
        }
    }
}

impl PersistScheduler {
    pub fn new(storage: Arc<dyn TaskStorage>, clock: Arc<dyn Clock>, delay: Duration) -> Self {
        let (status, _) = watch::channel(PersistStatus::Idle);
        Self {
            storage,
            clock,
            delay,
            pending: None,
            status: Arc::new(status),
        }
    }

    pub fn storage(&self) -> &Arc<dyn TaskStorage> {
        &self.storage
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn status(&self) -> PersistStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<PersistStatus> {
        self.status.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.handle.is_finished())
    }

    /// Write `snapshot` once no further schedule arrives for the quiet period
    pub fn schedule(&mut self, snapshot: Vec<Task>) {
        let previous = self.take_pending();

        let deadline = Instant::now() + self.delay;
        let storage = Arc::clone(&self.storage);
        let clock = Arc::clone(&self.clock);
        let status = Arc::clone(&self.status);
        status.send_replace(PersistStatus::Pending);
        debug!(count = snapshot.len(), delay_ms = self.delay.as_millis() as u64, "Scheduled task write");

        let (cancel, cancelled) = oneshot::channel();
        let handle = tokio::spawn(async move {
            // A dropped sender is not a cancellation; only an explicit send is
            let cancelled = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => false,
                Ok(()) = cancelled => true,
            };
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if cancelled {
                return;
            }
            let result = write_blocking(storage, snapshot).await;
            status.send_replace(outcome(&result, clock.as_ref()));
        });
        self.pending = Some(PendingWrite {
            handle,
            cancel: Some(cancel),
        });
    }

    /// Drop the pending write, if it has not reached storage yet.
    ///
    /// A write already in progress still completes, and `settle` or `flush`
    /// wait for it.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.cancel();
        }
    }

    /// Cancel any pending timer and write `snapshot` immediately
    pub async fn flush(&mut self, snapshot: Vec<Task>) -> Result<(), StorageError> {
        if let Some(previous) = self.take_pending() {
            let _ = previous.await;
        }
        let result = write_blocking(Arc::clone(&self.storage), snapshot).await;
        self.status.send_replace(outcome(&result, self.clock.as_ref()));
        result.map(|_| ())
    }

    /// Wait for the pending write, if any, to finish
    pub async fn settle(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.handle.await;
        }
    }

    // Cancel the waiting timer and hand back the task so the next write can
    // wait for a write that already started
    fn take_pending(&mut self) -> Option<JoinHandle<()>> {
        self.pending.take().map(|mut pending| {
            pending.cancel();
            pending.handle
        })
    }
}

async fn write_blocking(storage: Arc<dyn TaskStorage>, snapshot: Vec<Task>) -> Result<usize, StorageError> {
    let count = snapshot.len();
    tokio::task::spawn_blocking(move || storage.write_tasks(&snapshot))
        .await
        .map_err(|e| StorageError::Unavailable(format!("write worker failed: {e}")))??;
    Ok(count)
}

fn outcome(result: &Result<usize, StorageError>, clock: &dyn Clock) -> PersistStatus {
    match result {
        Ok(tasks) => {
            debug!(tasks, "Persisted tasks");
            PersistStatus::Saved {
                tasks: *tasks,
                at: clock.now(),
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to persist tasks");
            PersistStatus::Failed { error: e.to_string() }
        }
    }
}
