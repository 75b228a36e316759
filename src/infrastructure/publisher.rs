//! Publisher adapters for statistics records.

use crate::application::ports::Publisher;
use crate::domain::summary::StatsRecord;

/// Publishes statistics records as `tracing` events.
///
/// Each record becomes one `info` event with the rendered entries as the
/// `stats` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

impl TracingPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Publisher for TracingPublisher {
    fn publish(&self, record: StatsRecord) {
        tracing::info!(
            entries = record.len(),
            stats = %record.format_message(),
            "{}",
            record.title()
        );
    }
}
