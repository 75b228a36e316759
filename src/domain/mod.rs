//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts and invariants of the system:
//! - Component and counter naming
//! - Counter clusters and their expiry rule
//! - Token buckets
//! - Log records and filter expressions
//! - Statistics records and pruning summaries
//!
//! All types in this layer are pure and easily testable.

pub mod cluster;
pub mod component;
pub mod counter;
pub mod filter;
pub mod record;
pub mod summary;
pub mod token_bucket;
