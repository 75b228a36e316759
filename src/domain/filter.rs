//! Filter expression nodes evaluated against batches of records.

use crate::domain::record::LogRecord;
use std::fmt::Debug;

/// A node of a filter expression.
///
/// Nodes are evaluated against a whole batch and return one decision for
/// it. `init` runs once before the pipeline starts; an error there is a
/// configuration error and prevents startup.
pub trait FilterExpr: Send + Sync + Debug {
    /// Validate the node before first use.
    fn init(&mut self) -> Result<(), FilterError> {
        Ok(())
    }

    /// Decide whether the batch passes.
    fn eval(&self, records: &[LogRecord]) -> bool;
}

/// Error returned when a filter node fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The node's configuration is invalid
    InvalidConfig(String),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::InvalidConfig(reason) => write!(f, "invalid filter configuration: {}", reason),
        }
    }
}

impl std::error::Error for FilterError {}

/// Negates its child.
#[derive(Debug)]
pub struct NotFilter(pub Box<dyn FilterExpr>);

impl FilterExpr for NotFilter {
    fn init(&mut self) -> Result<(), FilterError> {
        self.0.init()
    }

    fn eval(&self, records: &[LogRecord]) -> bool {
        !self.0.eval(records)
    }
}

/// Passes when both children pass; the right child is skipped if the left fails.
#[derive(Debug)]
pub struct AndFilter(pub Box<dyn FilterExpr>, pub Box<dyn FilterExpr>);

impl FilterExpr for AndFilter {
    fn init(&mut self) -> Result<(), FilterError> {
        self.0.init()?;
        self.1.init()
    }

    fn eval(&self, records: &[LogRecord]) -> bool {
        self.0.eval(records) && self.1.eval(records)
    }
}

/// Passes when either child passes; the right child is skipped if the left passes.
#[derive(Debug)]
pub struct OrFilter(pub Box<dyn FilterExpr>, pub Box<dyn FilterExpr>);

impl FilterExpr for OrFilter {
    fn init(&mut self) -> Result<(), FilterError> {
        self.0.init()?;
        self.1.init()
    }

    fn eval(&self, records: &[LogRecord]) -> bool {
        self.0.eval(records) || self.1.eval(records)
    }
}

/// Passes when the last record of the batch has `field == value`.
#[derive(Debug, Clone)]
pub struct FieldEqualsFilter {
    field: String,
    value: String,
}

impl FieldEqualsFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl FilterExpr for FieldEqualsFilter {
    fn init(&mut self) -> Result<(), FilterError> {
        if self.field.is_empty() {
            return Err(FilterError::InvalidConfig(
                "field name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn eval(&self, records: &[LogRecord]) -> bool {
        records
            .last()
            .map(|record| record.get(&self.field) == self.value)
            .unwrap_or(false)
    }
}
