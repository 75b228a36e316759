//! Configuration for the statistics subsystem and throttle filters.

use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

/// Error returned when statistics options fail validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// Statistics level must not be negative
    NegativeLevel(i32),
    /// Counter lifetime must not be negative
    NegativeLifetime(i64),
}

impl std::fmt::Display for OptionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionsError::NegativeLevel(level) => {
                write!(f, "stats level must be 0 or greater, got {}", level)
            }
            OptionsError::NegativeLifetime(lifetime) => {
                write!(f, "stats lifetime must be 0 or greater, got {}", lifetime)
            }
        }
    }
}

impl std::error::Error for OptionsError {}

/// Options of the statistics subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatsOptions {
    /// Highest counter level that gets registered
    pub level: i32,
    /// Seconds between published statistics; 0 disables publishing
    pub log_freq: i64,
    /// Seconds an orphaned dynamic counter is kept
    pub lifetime: i64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            level: 0,
            log_freq: 600,
            lifetime: 600,
        }
    }
}

impl StatsOptions {
    /// Validate the options.
    ///
    /// # Errors
    /// Returns an `OptionsError` for a negative level or lifetime.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.level < 0 {
            return Err(OptionsError::NegativeLevel(self.level));
        }
        if self.lifetime < 0 {
            return Err(OptionsError::NegativeLifetime(self.lifetime));
        }
        Ok(())
    }

    /// Whether counters of `level` are enabled.
    pub fn check_level(&self, level: i32) -> bool {
        self.level >= level
    }

    /// Whether each maintenance pass publishes a statistics record.
    pub fn publishes(&self) -> bool {
        self.log_freq > 0
    }

    /// Period of the maintenance timer, `None` when it is disabled.
    ///
    /// Uses `log_freq` when it is set, otherwise half the lifetime (at least
    /// one second) so stale counters are pruned in time. A negative
    /// `log_freq` disables the timer.
    pub fn timer_period(&self) -> Option<Duration> {
        let freq = if self.log_freq != 0 {
            self.log_freq
        } else if self.lifetime <= 1 {
            1
        } else {
            self.lifetime / 2
        };

        u64::try_from(freq)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Error returned when a throttle filter configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleConfigError {
    /// Rate must be a positive integer
    NonPositiveRate(i64),
    /// Rate does not fit in 32 bits
    RateTooLarge(i64),
    /// Key field reference is empty
    EmptyKeyField,
}

impl std::fmt::Display for ThrottleConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleConfigError::NonPositiveRate(rate) => write!(
                f,
                "throttle: the rate() argument is required, and must be non zero (got {})",
                rate
            ),
            ThrottleConfigError::RateTooLarge(rate) => {
                write!(f, "throttle: rate {} is too large", rate)
            }
            ThrottleConfigError::EmptyKeyField => {
                write!(f, "throttle: the key() argument must name a field")
            }
        }
    }
}

impl std::error::Error for ThrottleConfigError {}

/// Raw throttle options as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ThrottleOptions {
    /// Tokens per second, also the bucket capacity
    #[serde(default)]
    pub rate: i64,
    /// Field whose value selects the bucket
    #[serde(default)]
    pub key: Option<String>,
}

/// Validated throttle configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    rate: NonZeroU32,
    key: Option<String>,
}

impl ThrottleConfig {
    /// Create a validated configuration.
    ///
    /// # Errors
    /// Returns `ThrottleConfigError::NonPositiveRate` if `rate <= 0`, and
    /// `ThrottleConfigError::EmptyKeyField` if `key` is an empty string.
    pub fn new(rate: i64, key: Option<String>) -> Result<Self, ThrottleConfigError> {
        if rate <= 0 {
            return Err(ThrottleConfigError::NonPositiveRate(rate));
        }
        let rate = u32::try_from(rate)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(ThrottleConfigError::RateTooLarge(rate))?;
        if key.as_deref() == Some("") {
            return Err(ThrottleConfigError::EmptyKeyField);
        }
        Ok(Self { rate, key })
    }

    pub fn rate(&self) -> NonZeroU32 {
        self.rate
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl TryFrom<ThrottleOptions> for ThrottleConfig {
    type Error = ThrottleConfigError;

    fn try_from(options: ThrottleOptions) -> Result<Self, Self::Error> {
        ThrottleConfig::new(options.rate, options.key)
    }
}
