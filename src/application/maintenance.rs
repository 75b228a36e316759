//! Periodic publishing and pruning of counter clusters.
//!
//! A maintenance pass sweeps the whole registry under its lock. Every visited
//! cluster is rendered into a statistics record (when publishing is enabled)
//! and then checked for expiry; stale dynamic clusters are removed. The
//! record is handed to the [`Publisher`] after the lock is released.

use crate::application::options::StatsOptions;
use crate::application::ports::{Clock, Publisher};
use crate::application::registry::StatsRegistry;
use crate::domain::summary::{PruneSummary, StatsRecord};

#[cfg(feature = "async")]
use std::time::Duration;
#[cfg(feature = "async")]
use tokio::sync::oneshot;
#[cfg(feature = "async")]
use tokio::task::JoinHandle;

/// Title of the published statistics record.
pub const STATS_RECORD_TITLE: &str = "Log statistics";

/// Run one maintenance pass.
///
/// Returns what was pruned. Emits an `info` event when at least one cluster
/// was removed.
pub fn publish_and_prune(
    registry: &StatsRegistry,
    options: &StatsOptions,
    clock: &dyn Clock,
    publisher: &dyn Publisher,
) -> PruneSummary {
    let now = clock.unix_time();
    let mut record = options
        .publishes()
        .then(|| StatsRecord::new(STATS_RECORD_TITLE));
    let mut summary = PruneSummary::default();

    registry.foreach_remove(|cluster| {
        if let Some(record) = record.as_mut() {
            cluster.format_into(record);
        }

        let expired = cluster.is_expired(now, options.lifetime);
        if expired {
            summary.record(cluster.stamp().unwrap_or_default());
        }
        expired
    });

    if let Some(record) = record {
        publisher.publish(record);
    }

    if summary.dropped > 0 {
        tracing::info!(
            dropped = summary.dropped,
            oldest_timestamp = summary.oldest_timestamp,
            "Pruning stats-counters have finished"
        );
    }

    summary
}

/// What the timer does after a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Schedule the next firing one period from now
    Rearm,
    /// Stop the timer
    Stop,
}

/// Error returned when the maintenance timer task fails to shut down cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// The timer task panicked
    TaskPanicked,
    /// The timer task was cancelled before it could finish
    TaskCancelled,
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::TaskPanicked => write!(f, "maintenance timer task panicked"),
            ShutdownError::TaskCancelled => write!(f, "maintenance timer task was cancelled"),
        }
    }
}

impl std::error::Error for ShutdownError {}

/// Handle to a running maintenance timer.
///
/// Dropping the handle stops the timer before its next firing;
/// [`TimerHandle::shutdown`] also waits for the task to finish.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct TimerHandle {
    period: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<()>,
}

#[cfg(feature = "async")]
impl TimerHandle {
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the timer task has finished, either stopped or shut down.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Stop the timer and wait for the task to exit.
    ///
    /// # Errors
    /// Returns a `ShutdownError` if the task panicked or was aborted.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already have stopped on its own
            let _ = tx.send(());
        }

        match (&mut self.join_handle).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_panic() => Err(ShutdownError::TaskPanicked),
            Err(_) => Err(ShutdownError::TaskCancelled),
        }
    }
}

/// Start a repeating timer on the current tokio runtime.
///
/// `on_fire` runs every `period`; its return value decides whether the
/// timer is re-armed. Must be called from within a tokio runtime.
#[cfg(feature = "async")]
pub fn spawn_timer<F>(period: Duration, mut on_fire: F) -> TimerHandle
where
    F: FnMut() -> TimerAction + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                // Fires on an explicit shutdown and when the handle is dropped
                _ = &mut shutdown_rx => break,
                _ = tokio::time::sleep(period) => {
                    if on_fire() == TimerAction::Stop {
                        tracing::debug!("maintenance timer stopped");
                        break;
                    }
                }
            }
        }
    });

    TimerHandle {
        period,
        shutdown_tx: Some(shutdown_tx),
        join_handle,
    }
}
