//! Clock adapters for time operations.
//!
//! Provides SystemClock implementation for production use.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! stats-throttle = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// System clock backed by `Instant::now()` and `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_time(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
            // wall clock set before 1970
            Err(e) => i64::try_from(e.duration().as_secs()).map_or(i64::MIN, |secs| -secs),
        }
    }
}
