//! Mock publisher for testing.

use crate::application::ports::Publisher;
use crate::domain::summary::StatsRecord;
use parking_lot::Mutex;
use std::sync::Arc;

/// Publisher that keeps every record it receives.
///
/// Clones share the collected records.
#[derive(Debug, Clone, Default)]
pub struct CollectingPublisher {
    records: Arc<Mutex<Vec<StatsRecord>>>,
}

impl CollectingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records published so far, oldest first.
    pub fn records(&self) -> Vec<StatsRecord> {
        self.records.lock().clone()
    }

    /// The most recently published record.
    pub fn last(&self) -> Option<StatsRecord> {
        self.records.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Publisher for CollectingPublisher {
    fn publish(&self, record: StatsRecord) {
        self.records.lock().push(record);
    }
}
