//! Mock clock for testing.

use crate::application::ports::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct MockTime {
    instant: Instant,
    unix_time: i64,
}

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of token refill and counter expiry. The monotonic instant and the
/// wall-clock seconds move together.
///
/// # Examples
///
/// ```
/// use stats_throttle::infrastructure::mocks::MockClock;
/// use stats_throttle::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::with_unix_time(start, 1_700_000_000);
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + Duration::from_secs(10));
/// assert_eq!(clock.unix_time(), 1_700_000_010);
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<MockTime>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant and the Unix epoch.
    pub fn new(start: Instant) -> Self {
        Self::with_unix_time(start, 0)
    }

    /// Create a mock clock starting at `start` and `unix_time` seconds.
    pub fn with_unix_time(start: Instant, unix_time: i64) -> Self {
        Self {
            current: Arc::new(Mutex::new(MockTime {
                instant: start,
                unix_time,
            })),
        }
    }

    /// Advance both clocks by a duration.
    ///
    /// Wall-clock seconds advance by the whole seconds of `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.current.lock();
        time.instant += duration;
        time.unix_time += i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
    }

    /// Set the monotonic clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        self.current.lock().instant = instant;
    }

    /// Set the wall clock to a specific number of seconds since the epoch.
    pub fn set_unix_time(&self, unix_time: i64) {
        self.current.lock().unix_time = unix_time;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current.lock().instant
    }

    fn unix_time(&self) -> i64 {
        self.current.lock().unix_time
    }
}
