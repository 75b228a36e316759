//! Process-scoped statistics context.
//!
//! [`StatsContext`] bundles the active [`StatsOptions`], the cluster
//! registry and the maintenance timer. It is cheap to clone and meant to be
//! handed to every pipeline component that owns counters.
//!
//! # Lifecycle
//!
//! - build it with [`StatsContext::new`] or [`StatsContext::builder`]
//! - call [`StatsContext::reinit`] whenever configuration is (re)loaded; this
//!   applies the options and restarts the maintenance timer
//! - call [`StatsContext::shutdown`] (or [`StatsContext::teardown`] from
//!   synchronous code) to stop the timer and drop every cluster
//!
//! # Example
//!
//! ```rust
//! use stats_throttle::{ClusterKey, Component, ComponentKind, CounterKind, StatsContext, StatsOptions};
//!
//! let stats = StatsContext::new(StatsOptions::default()).unwrap();
//! let key = ClusterKey::new(Component::source(ComponentKind::File), "s_file", Some("/var/log/x"));
//!
//! if let Some(processed) = stats.register_counter(0, key, CounterKind::Processed) {
//!     processed.inc();
//!     stats.unregister_counter(processed);
//! }
//! ```

use crate::application::maintenance;
use crate::application::options::{OptionsError, StatsOptions};
use crate::application::ports::{Clock, Publisher};
use crate::application::registry::{CounterHandle, StatsRegistry};
use crate::domain::cluster::ClusterKey;
use crate::domain::counter::CounterKind;
use crate::domain::summary::PruneSummary;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::publisher::TracingPublisher;
use parking_lot::RwLock;
use std::sync::Arc;

#[cfg(feature = "async")]
use crate::application::maintenance::{ShutdownError, TimerAction, TimerHandle};
#[cfg(feature = "async")]
use parking_lot::Mutex;
#[cfg(feature = "async")]
use std::sync::Weak;
#[cfg(feature = "async")]
use std::time::Duration;

/// Error returned when the maintenance timer cannot be managed.
#[cfg(feature = "async")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// No tokio runtime is available on the calling thread
    NoRuntime,
    /// The previous timer task did not shut down cleanly
    Shutdown(ShutdownError),
}

#[cfg(feature = "async")]
impl std::fmt::Display for TimerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerError::NoRuntime => {
                write!(f, "maintenance timer requires a running tokio runtime")
            }
            TimerError::Shutdown(e) => write!(f, "maintenance timer shutdown failed: {}", e),
        }
    }
}

#[cfg(feature = "async")]
impl std::error::Error for TimerError {}

#[cfg(feature = "async")]
impl From<ShutdownError> for TimerError {
    fn from(e: ShutdownError) -> Self {
        TimerError::Shutdown(e)
    }
}

/// Error returned by [`StatsContext`] lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The supplied options failed validation
    InvalidOptions(OptionsError),
    /// The maintenance timer could not be managed
    #[cfg(feature = "async")]
    Timer(TimerError),
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::InvalidOptions(e) => write!(f, "invalid stats options: {}", e),
            #[cfg(feature = "async")]
            StatsError::Timer(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StatsError {}

impl From<OptionsError> for StatsError {
    fn from(e: OptionsError) -> Self {
        StatsError::InvalidOptions(e)
    }
}

#[cfg(feature = "async")]
impl From<TimerError> for StatsError {
    fn from(e: TimerError) -> Self {
        StatsError::Timer(e)
    }
}

/// Builder for constructing a [`StatsContext`].
#[derive(Debug, Default)]
pub struct StatsContextBuilder {
    options: StatsOptions,
    clock: Option<Arc<dyn Clock>>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl StatsContextBuilder {
    pub fn with_options(mut self, options: StatsOptions) -> Self {
        self.options = options;
        self
    }

    /// Set a custom clock, mainly for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set where statistics records go. Defaults to [`TracingPublisher`].
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Build the context. The maintenance timer is not started yet.
    ///
    /// # Errors
    /// Returns `StatsError::InvalidOptions` if the options fail validation.
    pub fn build(self) -> Result<StatsContext, StatsError> {
        self.options.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let publisher = self
            .publisher
            .unwrap_or_else(|| Arc::new(TracingPublisher::new()));

        Ok(StatsContext {
            inner: Arc::new(ContextInner {
                options: RwLock::new(self.options),
                registry: StatsRegistry::new(),
                clock,
                publisher,
                #[cfg(feature = "async")]
                timer: Mutex::new(None),
            }),
        })
    }
}

/// Shared statistics state of a process.
#[derive(Debug, Clone)]
pub struct StatsContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    options: RwLock<StatsOptions>,
    registry: StatsRegistry,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn Publisher>,
    #[cfg(feature = "async")]
    timer: Mutex<Option<TimerHandle>>,
}

impl ContextInner {
    fn publish_and_prune(&self) -> PruneSummary {
        let options = *self.options.read();
        maintenance::publish_and_prune(
            &self.registry,
            &options,
            self.clock.as_ref(),
            self.publisher.as_ref(),
        )
    }
}

impl StatsContext {
    /// Create a context with the system clock and the tracing publisher.
    ///
    /// # Errors
    /// Returns `StatsError::InvalidOptions` if the options fail validation.
    pub fn new(options: StatsOptions) -> Result<Self, StatsError> {
        Self::builder().with_options(options).build()
    }

    pub fn builder() -> StatsContextBuilder {
        StatsContextBuilder::default()
    }

    /// The options currently in effect.
    pub fn options(&self) -> StatsOptions {
        *self.inner.options.read()
    }

    /// Whether counters of `level` are enabled.
    pub fn check_level(&self, level: i32) -> bool {
        self.inner.options.read().check_level(level)
    }

    pub fn registry(&self) -> &StatsRegistry {
        &self.inner.registry
    }

    /// Register a counter on a static cluster.
    ///
    /// Returns `None` when `level` is not enabled.
    pub fn register_counter(
        &self,
        level: i32,
        key: ClusterKey,
        kind: CounterKind,
    ) -> Option<CounterHandle> {
        self.check_level(level)
            .then(|| self.inner.registry.register_counter(key, kind))
    }

    /// Register a counter on a dynamic cluster.
    ///
    /// Returns `None` when `level` is not enabled.
    pub fn register_dynamic_counter(
        &self,
        level: i32,
        key: ClusterKey,
        kind: CounterKind,
    ) -> Option<CounterHandle> {
        self.check_level(level)
            .then(|| self.inner.registry.register_dynamic_counter(key, kind))
    }

    pub fn unregister_counter(&self, handle: CounterHandle) {
        self.inner.registry.unregister_counter(handle);
    }

    /// Count one processed record on a dynamic cluster without keeping it referenced.
    ///
    /// Registers the cluster, increments `processed`, records `timestamp` in
    /// the stamp counter when it is not negative, and unregisters again, all
    /// under a single registry lock. The cluster is left to expire once
    /// `timestamp` is older than the lifetime.
    pub fn instant_inc_dynamic_counter(&self, level: i32, key: ClusterKey, timestamp: i64) {
        if !self.check_level(level) {
            return;
        }

        let mut guard = self.inner.registry.lock();
        let processed = guard.register_counter(key.clone(), CounterKind::Processed, true);
        processed.inc();

        if timestamp >= 0 {
            let stamp = guard.register_counter(key, CounterKind::Stamp, true);
            stamp.set(timestamp);
            guard.unregister_counter(stamp);
        }
        guard.unregister_counter(processed);
    }

    /// Run one maintenance pass now, independent of the timer.
    pub fn publish_and_prune(&self) -> PruneSummary {
        self.inner.publish_and_prune()
    }

    /// Replace the active options and restart the maintenance timer.
    ///
    /// Outside a tokio runtime the options are still applied, a warning is
    /// logged, and passes only run through [`StatsContext::publish_and_prune`].
    ///
    /// # Errors
    /// Returns `StatsError::InvalidOptions` if the options fail validation.
    /// The active options are left untouched in that case.
    pub fn reinit(&self, options: StatsOptions) -> Result<(), StatsError> {
        options.validate()?;
        *self.inner.options.write() = options;

        #[cfg(feature = "async")]
        {
            if let Err(e) = self.restart_timer() {
                tracing::warn!(error = %e, "stats maintenance timer not started");
            }
        }

        Ok(())
    }

    /// Stop the running timer, if any, and start one for the current options.
    ///
    /// Stays stopped when the options disable the timer.
    ///
    /// # Errors
    /// Returns `TimerError::NoRuntime` when called outside a tokio runtime.
    #[cfg(feature = "async")]
    pub fn restart_timer(&self) -> Result<(), TimerError> {
        let mut timer = self.inner.timer.lock();
        // Dropping the old handle cancels it before its next firing
        timer.take();

        let Some(period) = self.options().timer_period() else {
            return Ok(());
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TimerError::NoRuntime);
        }

        let weak: Weak<ContextInner> = Arc::downgrade(&self.inner);
        *timer = Some(maintenance::spawn_timer(period, move || {
            match weak.upgrade() {
                Some(inner) => {
                    inner.publish_and_prune();
                    TimerAction::Rearm
                }
                None => TimerAction::Stop,
            }
        }));
        Ok(())
    }

    /// Period of the running timer, `None` when no timer is running.
    #[cfg(feature = "async")]
    pub fn timer_period(&self) -> Option<Duration> {
        self.inner
            .timer
            .lock()
            .as_ref()
            .filter(|handle| !handle.is_finished())
            .map(TimerHandle::period)
    }

    /// Stop the timer, wait for it to exit, and drop every cluster.
    ///
    /// # Errors
    /// Returns `StatsError::Timer` if the timer task panicked or was
    /// cancelled. The registry is cleared either way.
    #[cfg(feature = "async")]
    pub async fn shutdown(&self) -> Result<(), StatsError> {
        let handle = self.inner.timer.lock().take();
        let result = match handle {
            Some(handle) => handle.shutdown().await.map_err(TimerError::from),
            None => Ok(()),
        };

        self.inner.registry.clear();
        result.map_err(StatsError::from)
    }

    /// Cancel the timer without waiting for it, and drop every cluster.
    pub fn teardown(&self) {
        #[cfg(feature = "async")]
        self.inner.timer.lock().take();

        self.inner.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::{Component, ComponentKind};
    use crate::infrastructure::mocks::{CollectingPublisher, MockClock};
    use std::time::Instant;

    const NOW: i64 = 1_700_000_000;

    fn context(options: StatsOptions) -> (StatsContext, MockClock, Arc<CollectingPublisher>) {
        let clock = MockClock::with_unix_time(Instant::now(), NOW);
        let publisher = Arc::new(CollectingPublisher::new());
        let ctx = StatsContext::builder()
            .with_options(options)
            .with_clock(Arc::new(clock.clone()))
            .with_publisher(publisher.clone())
            .build()
            .unwrap();
        (ctx, clock, publisher)
    }

    fn sender_key(sender: &str) -> ClusterKey {
        ClusterKey::new(Component::plain(ComponentKind::Sender), "", Some(sender))
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let result = StatsContext::new(StatsOptions {
            level: -1,
            ..StatsOptions::default()
        });
        assert!(matches!(
            result,
            Err(StatsError::InvalidOptions(OptionsError::NegativeLevel(-1)))
        ));
    }

    #[test]
    fn test_register_respects_level() {
        let (ctx, _, _) = context(StatsOptions {
            level: 1,
            ..StatsOptions::default()
        });
        let key = ClusterKey::new(Component::source(ComponentKind::Tcp), "s_net", None);

        assert!(ctx.register_counter(2, key.clone(), CounterKind::Processed).is_none());
        assert!(ctx.registry().is_empty());

        let handle = ctx.register_counter(1, key.clone(), CounterKind::Processed).unwrap();
        handle.inc();
        ctx.unregister_counter(handle);
        assert!(ctx.registry().contains(&key));
    }

    #[test]
    fn test_instant_inc_dynamic_counter() {
        let (ctx, _, _) = context(StatsOptions::default());

        ctx.instant_inc_dynamic_counter(0, sender_key("host-a"), NOW - 10);
        ctx.instant_inc_dynamic_counter(0, sender_key("host-a"), NOW);

        let cluster = ctx.registry().get(&sender_key("host-a")).unwrap();
        assert!(cluster.is_dynamic());
        assert_eq!(cluster.ref_count(), 0);
        assert_eq!(cluster.counter(CounterKind::Processed).get(), 2);
        assert_eq!(cluster.stamp(), Some(NOW));
    }

    #[test]
    fn test_instant_inc_without_timestamp_never_expires() {
        let (ctx, _, _) = context(StatsOptions {
            lifetime: 1,
            ..StatsOptions::default()
        });

        ctx.instant_inc_dynamic_counter(0, sender_key("host-b"), -1);
        let summary = ctx.publish_and_prune();

        assert_eq!(summary.dropped, 0);
        assert!(ctx.registry().contains(&sender_key("host-b")));
    }

    #[test]
    fn test_manual_pass_prunes_with_current_options() {
        let (ctx, clock, publisher) = context(StatsOptions::default());
        ctx.instant_inc_dynamic_counter(0, sender_key("host-c"), NOW);

        assert_eq!(ctx.publish_and_prune().dropped, 0);

        clock.advance(std::time::Duration::from_secs(601));
        let summary = ctx.publish_and_prune();
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.oldest_timestamp, NOW);
        assert_eq!(publisher.records().len(), 2);
    }

    #[test]
    fn test_reinit_replaces_options() {
        let (ctx, _, _) = context(StatsOptions::default());
        let new_options = StatsOptions {
            level: 3,
            log_freq: 0,
            lifetime: 60,
        };

        ctx.reinit(new_options).unwrap();
        assert_eq!(ctx.options(), new_options);
        assert!(ctx.check_level(3));
    }

    #[test]
    fn test_reinit_keeps_options_on_error() {
        let (ctx, _, _) = context(StatsOptions::default());
        let result = ctx.reinit(StatsOptions {
            lifetime: -1,
            ..StatsOptions::default()
        });

        assert!(result.is_err());
        assert_eq!(ctx.options(), StatsOptions::default());
    }

    #[cfg(feature = "async")]
    #[test]
    fn test_reinit_outside_runtime_has_no_timer() {
        let (ctx, _, _) = context(StatsOptions::default());
        ctx.reinit(StatsOptions::default()).unwrap();

        assert_eq!(ctx.timer_period(), None);
        assert_eq!(ctx.restart_timer(), Err(TimerError::NoRuntime));
    }

    #[test]
    fn test_teardown_clears_registry() {
        let (ctx, _, _) = context(StatsOptions::default());
        ctx.instant_inc_dynamic_counter(0, sender_key("host-d"), NOW);
        assert_eq!(ctx.registry().len(), 1);

        ctx.teardown();
        assert!(ctx.registry().is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_timer_publishes_every_log_freq() {
        let (ctx, _, publisher) = context(StatsOptions::default());
        ctx.reinit(StatsOptions {
            log_freq: 10,
            ..StatsOptions::default()
        })
        .unwrap();
        assert_eq!(ctx.timer_period(), Some(Duration::from_secs(10)));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(publisher.records().len(), 2);

        ctx.shutdown().await.unwrap();
        assert_eq!(ctx.timer_period(), None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(publisher.records().len(), 2);
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_reinit_restarts_timer_with_new_period() {
        let (ctx, _, publisher) = context(StatsOptions::default());
        ctx.reinit(StatsOptions {
            log_freq: 100,
            ..StatsOptions::default()
        })
        .unwrap();

        ctx.reinit(StatsOptions {
            log_freq: 5,
            ..StatsOptions::default()
        })
        .unwrap();
        assert_eq!(ctx.timer_period(), Some(Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(publisher.records().len(), 2);

        ctx.shutdown().await.unwrap();
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_negative_log_freq_disables_timer() {
        let (ctx, _, publisher) = context(StatsOptions::default());
        ctx.reinit(StatsOptions {
            log_freq: -1,
            ..StatsOptions::default()
        })
        .unwrap();

        assert_eq!(ctx.timer_period(), None);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(publisher.records().is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_when_context_dropped() {
        let (ctx, _, publisher) = context(StatsOptions {
            log_freq: 1,
            ..StatsOptions::default()
        });
        ctx.restart_timer().unwrap();
        drop(ctx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(publisher.records().is_empty());
    }
}
