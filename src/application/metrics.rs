//! Observability metrics for throttle filters.
//!
//! Provides metrics about admission decisions for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking throttle decisions.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Batches that passed the filter
    batches_admitted: AtomicU64,
    /// Batches dropped by the filter
    batches_denied: AtomicU64,
    /// Records contained in dropped batches
    records_dropped: AtomicU64,
    /// Token buckets created for new keys
    buckets_created: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.batches_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self, records: usize) {
        self.inner.batches_denied.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_dropped
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_bucket_created(&self) {
        self.inner.buckets_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batches_admitted(&self) -> u64 {
        self.inner.batches_admitted.load(Ordering::Relaxed)
    }

    pub fn batches_denied(&self) -> u64 {
        self.inner.batches_denied.load(Ordering::Relaxed)
    }

    pub fn records_dropped(&self) -> u64 {
        self.inner.records_dropped.load(Ordering::Relaxed)
    }

    pub fn buckets_created(&self) -> u64 {
        self.inner.buckets_created.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_admitted: self.batches_admitted(),
            batches_denied: self.batches_denied(),
            records_dropped: self.records_dropped(),
            buckets_created: self.buckets_created(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.batches_admitted.store(0, Ordering::Relaxed);
        self.inner.batches_denied.store(0, Ordering::Relaxed);
        self.inner.records_dropped.store(0, Ordering::Relaxed);
        self.inner.buckets_created.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub batches_admitted: u64,
    pub batches_denied: u64,
    pub records_dropped: u64,
    pub buckets_created: u64,
}

impl MetricsSnapshot {
    /// Ratio of denied batches to all evaluated batches (0.0 to 1.0).
    ///
    /// Returns 0.0 if nothing has been evaluated.
    pub fn denial_rate(&self) -> f64 {
        let total = self.total_batches();
        if total == 0 {
            0.0
        } else {
            self.batches_denied as f64 / total as f64
        }
    }

    /// Get the total number of batches evaluated (admitted + denied).
    pub fn total_batches(&self) -> u64 {
        self.batches_admitted.saturating_add(self.batches_denied)
    }
}
