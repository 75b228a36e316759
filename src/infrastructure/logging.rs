//! Subscriber setup for processes embedding the statistics subsystem.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Error returned when the global subscriber cannot be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// Neither `RUST_LOG` nor the default directive parsed as a filter
    InvalidDirective(String),
    /// A global subscriber was already set
    AlreadyInitialized(String),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::InvalidDirective(e) => write!(f, "invalid log filter directive: {}", e),
            LoggingError::AlreadyInitialized(e) => {
                write!(f, "global subscriber already installed: {}", e)
            }
        }
    }
}

impl std::error::Error for LoggingError {}

/// Build the filter from `RUST_LOG`, falling back to `default_directive`.
fn env_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| LoggingError::InvalidDirective(e.to_string()))
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Uses `default_directive` (e.g. `"info"` or `"stats_throttle=debug"`)
/// when `RUST_LOG` is unset or invalid.
///
/// # Errors
/// Returns `LoggingError` if the directive is invalid or a global
/// subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<(), LoggingError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive)?)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
