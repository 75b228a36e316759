//! Per-key token-bucket throttle filter.
//!
//! The filter maps a key, taken from a field of the last record in a batch,
//! to a [`TokenBucket`] and admits or drops the whole batch. Buckets are
//! created lazily on the first batch for a key and are never evicted.
//!
//! Two locks are involved: the storage's map lock guards bucket lookup and
//! creation only, and each bucket's own lock guards its balance. Batches for
//! different keys never contend beyond the lookup.
//!
//! # Example
//!
//! ```rust
//! use stats_throttle::{LogRecord, ThrottleDecision, ThrottleFilter};
//!
//! let filter = ThrottleFilter::builder()
//!     .with_rate(2)
//!     .with_key("HOST")
//!     .build()
//!     .unwrap();
//!
//! let batch = [LogRecord::new().with_field("HOST", "web-1")];
//! assert_eq!(filter.check_batch(&batch), ThrottleDecision::Admit);
//! assert_eq!(filter.check_batch(&batch), ThrottleDecision::Admit);
//! assert_eq!(filter.check_batch(&batch), ThrottleDecision::Deny);
//! ```

use crate::application::metrics::Metrics;
use crate::application::options::{ThrottleConfig, ThrottleConfigError, ThrottleOptions};
use crate::application::ports::{Clock, Storage};
use crate::domain::filter::{FilterError, FilterExpr};
use crate::domain::record::LogRecord;
use crate::domain::token_bucket::{ThrottleDecision, TokenBucket};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::storage::ShardedStorage;
use std::sync::Arc;

/// Default bucket storage of a throttle filter.
pub type BucketStorage = Arc<ShardedStorage<String, Arc<TokenBucket>>>;

impl From<ThrottleConfigError> for FilterError {
    fn from(e: ThrottleConfigError) -> Self {
        FilterError::InvalidConfig(e.to_string())
    }
}

/// Builder for constructing a `ThrottleFilter`.
#[derive(Debug, Default)]
pub struct ThrottleFilterBuilder {
    rate: i64,
    key: Option<String>,
    clock: Option<Arc<dyn Clock>>,
}

impl ThrottleFilterBuilder {
    /// Set the rate in records per second. It is also the burst capacity.
    pub fn with_rate(mut self, rate: i64) -> Self {
        self.rate = rate;
        self
    }

    /// Throttle each value of `field` independently.
    ///
    /// Without a key field every batch shares one bucket.
    pub fn with_key(mut self, field: impl Into<String>) -> Self {
        self.key = Some(field.into());
        self
    }

    /// Set a custom clock, mainly for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the filter.
    ///
    /// # Errors
    /// Returns `ThrottleConfigError` if the rate is missing, not positive or
    /// too large, or if the key field is empty.
    pub fn build(self) -> Result<ThrottleFilter, ThrottleConfigError> {
        let config = ThrottleConfig::new(self.rate, self.key)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        Ok(ThrottleFilter::with_storage(
            config,
            Arc::new(ShardedStorage::new()),
            clock,
        ))
    }
}

/// Filter node that rate limits batches per key.
///
/// Clones share buckets and metrics.
#[derive(Debug, Clone)]
pub struct ThrottleFilter<S = BucketStorage>
where
    S: Storage<String, Arc<TokenBucket>>,
{
    config: ThrottleConfig,
    storage: S,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl ThrottleFilter {
    pub fn builder() -> ThrottleFilterBuilder {
        ThrottleFilterBuilder::default()
    }

    /// Create a filter with the system clock and in-memory buckets.
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_storage(
            config,
            Arc::new(ShardedStorage::new()),
            Arc::new(SystemClock::new()),
        )
    }

    /// Create a filter from raw configuration options.
    ///
    /// # Errors
    /// Returns `FilterError::InvalidConfig` if the options fail validation.
    pub fn from_options(options: ThrottleOptions) -> Result<Self, FilterError> {
        let config = ThrottleConfig::try_from(options)?;
        Ok(Self::new(config))
    }
}

impl<S> ThrottleFilter<S>
where
    S: Storage<String, Arc<TokenBucket>>,
{
    /// Create a filter on custom bucket storage.
    pub fn with_storage(config: ThrottleConfig, storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            storage,
            clock,
            metrics: Metrics::new(),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of keys seen so far.
    pub fn bucket_count(&self) -> usize {
        self.storage.len()
    }

    /// Tokens left in the bucket for `key`, without refilling it.
    pub fn bucket_tokens(&self, key: &str) -> Option<u64> {
        let mut tokens = None;
        self.storage.for_each(|k, bucket| {
            if k == key {
                tokens = Some(bucket.tokens());
            }
        });
        tokens
    }

    /// Key of a batch: the key field of its last record, or `""`.
    fn batch_key<'a>(&self, records: &'a [LogRecord]) -> &'a str {
        match (self.config.key(), records.last()) {
            (Some(field), Some(last)) => last.get(field),
            _ => "",
        }
    }

    /// Decide whether a batch passes.
    ///
    /// The batch is admitted as a whole if its bucket holds at least as many
    /// tokens as the batch has records, and dropped as a whole otherwise.
    /// An empty batch is admitted without touching any bucket.
    pub fn check_batch(&self, records: &[LogRecord]) -> ThrottleDecision {
        if records.is_empty() {
            self.metrics.record_admitted();
            return ThrottleDecision::Admit;
        }

        let key = self.batch_key(records);
        let now = self.clock.now();
        let rate = self.config.rate();

        let bucket = self.storage.get_or_insert_with(key, || {
            tracing::debug!(key, rate = rate.get(), "creating throttle bucket");
            self.metrics.record_bucket_created();
            Arc::new(TokenBucket::new(rate, now))
        });

        let count = records.len();
        let decision = bucket.process(count as u64, now);
        match decision {
            ThrottleDecision::Admit => self.metrics.record_admitted(),
            ThrottleDecision::Deny => self.metrics.record_denied(count),
        }
        decision
    }
}

impl<S> FilterExpr for ThrottleFilter<S>
where
    S: Storage<String, Arc<TokenBucket>> + 'static,
{
    fn eval(&self, records: &[LogRecord]) -> bool {
        self.check_batch(records).is_admit()
    }
}
