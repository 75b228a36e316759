//! # stats-throttle
//!
//! Counter bookkeeping and admission control for high-throughput log pipelines.
//!
//! The crate has two halves that share the same clock and logging plumbing:
//!
//! - a **stats registry** of named counter clusters that pipeline components
//!   update on every record, with a periodic maintenance pass that publishes
//!   the counters and prunes stale per-host or per-sender clusters
//! - a **throttle filter** that rate limits batches of records with one
//!   token bucket per key
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stats_throttle::{
//!     ClusterKey, Component, ComponentKind, CounterKind, StatsContext, StatsOptions,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! stats_throttle::infrastructure::logging::init_logging("info")?;
//!
//! let stats = StatsContext::new(StatsOptions::default())?;
//! // Applies the options and starts the maintenance timer
//! stats.reinit(StatsOptions {
//!     level: 1,
//!     log_freq: 60,
//!     lifetime: 600,
//! })?;
//!
//! let key = ClusterKey::new(Component::source(ComponentKind::Tcp), "s_net", None);
//! let processed = stats
//!     .register_counter(0, key, CounterKind::Processed)
//!     .expect("level 0 is always enabled");
//! processed.inc();
//!
//! // Per-sender counters are created on the fly and expire on their own
//! let sender = ClusterKey::new(Component::plain(ComponentKind::Sender), "", Some("10.0.0.7"));
//! stats.instant_inc_dynamic_counter(1, sender, 1_700_000_000);
//!
//! stats.unregister_counter(processed);
//! stats.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Counters and Clusters
//!
//! A cluster is identified by a component (kind plus direction), an id and
//! an optional instance such as a client address or a file name. It holds
//! one atomic counter per [`CounterKind`]; only the kinds that were ever
//! registered are published.
//!
//! Counters are updated through a [`CounterHandle`] without taking any lock.
//! The registry lock only guards creating, finding, removing and iterating
//! clusters.
//!
//! ### Dynamic clusters
//!
//! Clusters registered as dynamic are pruned by the maintenance pass once
//! they are unreferenced and their stamp counter is older than
//! `lifetime` seconds. Static clusters are never pruned.
//!
//! ## Maintenance
//!
//! Each pass renders every cluster into a "Log statistics" record (when
//! `log_freq > 0`), hands it to the configured [`Publisher`], and removes
//! expired clusters. If anything was removed, an `info` event
//! `Pruning stats-counters have finished` carries `dropped` and
//! `oldest_timestamp`.
//!
//! The timer period is `log_freq` when it is set, otherwise half the
//! lifetime (at least one second). A negative `log_freq` disables the
//! timer; [`StatsContext::publish_and_prune`] still runs a pass by hand.
//!
//! ## Throttling
//!
//! ```rust
//! use stats_throttle::{LogRecord, ThrottleFilter};
//!
//! let filter = ThrottleFilter::builder()
//!     .with_rate(10)      // 10 records per second, burst of 10
//!     .with_key("HOST")   // one bucket per HOST value
//!     .build()
//!     .unwrap();
//!
//! let batch: Vec<_> = (0..10)
//!     .map(|_| LogRecord::new().with_field("HOST", "web-1"))
//!     .collect();
//! assert!(filter.check_batch(&batch).is_admit());
//! assert!(filter.check_batch(&batch[..1]).is_deny());
//!
//! // Other hosts have their own bucket
//! let other = [LogRecord::new().with_field("HOST", "web-2")];
//! assert!(filter.check_batch(&other).is_admit());
//! ```
//!
//! A batch is admitted or dropped as a whole. The key is read from the
//! **last** record of the batch. Buckets are never evicted, so watch
//! [`ThrottleFilter::bucket_count`] when keys have high cardinality.
//!
//! The filter implements [`FilterExpr`] and composes with [`NotFilter`],
//! [`AndFilter`] and [`OrFilter`].

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    cluster::{ClusterKey, StatsCluster},
    component::{Component, ComponentKind, Direction},
    counter::{CounterKind, CounterValue},
    filter::{AndFilter, FieldEqualsFilter, FilterError, FilterExpr, NotFilter, OrFilter},
    record::LogRecord,
    summary::{PruneSummary, StatsEntry, StatsRecord},
    token_bucket::{ThrottleDecision, TokenBucket},
};

pub use application::{
    context::{StatsContext, StatsContextBuilder, StatsError},
    maintenance::{publish_and_prune, ShutdownError, TimerAction, STATS_RECORD_TITLE},
    metrics::{Metrics, MetricsSnapshot},
    options::{OptionsError, StatsOptions, ThrottleConfig, ThrottleConfigError, ThrottleOptions},
    ports::{Clock, Publisher, Storage},
    registry::{CounterHandle, RegistryGuard, StatsRegistry},
    throttle::{BucketStorage, ThrottleFilter, ThrottleFilterBuilder},
};

#[cfg(feature = "async")]
pub use application::context::TimerError;

#[cfg(feature = "async")]
pub use application::maintenance::{spawn_timer, TimerHandle};

pub use infrastructure::{
    clock::SystemClock,
    logging::{init_logging, LoggingError},
    publisher::TracingPublisher,
    storage::ShardedStorage,
};
