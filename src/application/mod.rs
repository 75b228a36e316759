//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Cluster registry (storage of counter clusters)
//! - Statistics context (options, registration, lifecycle)
//! - Maintenance pass and timer (publishing and pruning)
//! - Throttle filter (admission decisions)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod context;
pub mod maintenance;
pub mod metrics;
pub mod options;
pub mod ports;
pub mod registry;
pub mod throttle;
