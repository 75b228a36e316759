//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Storage implementations (sharded maps)
//! - Publishing statistics records through `tracing`
//! - Subscriber installation

pub mod clock;
pub mod logging;
pub mod publisher;
pub mod storage;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for time,
/// publishing and captured tracing events.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// stats-throttle = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
