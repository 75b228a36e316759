//! Minimal log record as seen by filters.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// A log record carrying named field values.
///
/// Unset fields read as the empty string, so a filter keyed on a missing
/// field still groups those records together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    fields: BTreeMap<Cow<'static, str>, String>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Value of `name`, or `""` when unset.
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}
