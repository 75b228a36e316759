//! Statistics records and pruning summaries.
//!
//! A maintenance pass renders every visited cluster into a [`StatsRecord`]
//! and summarizes what it pruned in a [`PruneSummary`].

use crate::domain::counter::CounterKind;
use std::fmt;

/// One counter value as published in a statistics record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsEntry {
    /// Direction-and-component name, e.g. `src.file` or `destination`
    pub name: String,
    pub kind: CounterKind,
    pub id: String,
    pub instance: Option<String>,
    pub value: i64,
}

impl StatsEntry {
    /// Tag of the form `<direction><component>.<kind>`, e.g. `src.file.processed`.
    pub fn tag(&self) -> String {
        format!("{}.{}", self.name, self.kind.name())
    }
}

impl fmt::Display for StatsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.tag(), self.id)?;
        if let Some(instance) = self.instance.as_deref().filter(|i| !i.is_empty()) {
            if !self.id.is_empty() {
                f.write_str(",")?;
            }
            f.write_str(instance)?;
        }
        write!(f, ")={}", self.value)
    }
}

/// An outbound diagnostic record holding counter entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    title: String,
    entries: Vec<StatsEntry>,
}

impl StatsRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn push(&mut self, entry: StatsEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[StatsEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry with the given tag, id and instance.
    pub fn find(&self, tag: &str, id: &str, instance: Option<&str>) -> Option<&StatsEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id && e.instance.as_deref() == instance && e.tag() == tag)
    }

    /// Render all entries on one line, separated by `"; "`.
    pub fn format_message(&self) -> String {
        let mut message = format!("{};", self.title);
        for entry in &self.entries {
            message.push(' ');
            message.push_str(&entry.to_string());
            message.push(';');
        }
        message
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneSummary {
    /// Clusters removed during the pass
    pub dropped: usize,
    /// Smallest stamp among the removed clusters, 0 when nothing was removed
    pub oldest_timestamp: i64,
}

impl PruneSummary {
    /// Account for one removed cluster carrying `stamp`.
    pub fn record(&mut self, stamp: i64) {
        if self.dropped == 0 || stamp < self.oldest_timestamp {
            self.oldest_timestamp = stamp;
        }
        self.dropped += 1;
    }

    pub fn format_message(&self) -> String {
        format!(
            "Pruning stats-counters have finished; dropped='{}', oldest-timestamp='{}'",
            self.dropped, self.oldest_timestamp
        )
    }
}
