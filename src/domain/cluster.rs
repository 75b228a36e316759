//! Counter clusters: the counters of one pipeline component instance.

use crate::domain::component::Component;
use crate::domain::counter::{CounterKind, CounterValue, LiveMask};
use crate::domain::summary::{StatsEntry, StatsRecord};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of a cluster within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub component: Component,
    /// Configuration item the counters belong to (e.g. a source name)
    pub id: String,
    /// Disambiguates several counter sets of the same item (client address, file name)
    pub instance: Option<String>,
}

impl ClusterKey {
    pub fn new(component: Component, id: impl Into<String>, instance: Option<&str>) -> Self {
        Self {
            component,
            id: id.into(),
            instance: instance.map(str::to_owned),
        }
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.component, self.id)?;
        match self.instance.as_deref() {
            Some(instance) if !instance.is_empty() => {
                if !self.id.is_empty() {
                    f.write_str(",")?;
                }
                write!(f, "{})", instance)
            }
            _ => f.write_str(")"),
        }
    }
}

/// A group of counters sharing one identity.
///
/// Counter values are atomics and may be touched from any thread. The
/// reference count and the live mask only change while the registry lock is
/// held.
#[derive(Debug)]
pub struct StatsCluster {
    key: ClusterKey,
    counters: [CounterValue; CounterKind::COUNT],
    live_mask: LiveMask,
    dynamic: bool,
    ref_count: AtomicUsize,
}

impl StatsCluster {
    pub fn new(key: ClusterKey, dynamic: bool) -> Self {
        Self {
            key,
            counters: Default::default(),
            live_mask: LiveMask::default(),
            dynamic,
            ref_count: AtomicUsize::new(0),
        }
    }

    pub fn key(&self) -> &ClusterKey {
        &self.key
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Relaxed)
    }

    pub fn counter(&self, kind: CounterKind) -> &CounterValue {
        &self.counters[kind.index()]
    }

    pub fn is_live(&self, kind: CounterKind) -> bool {
        self.live_mask.contains(kind)
    }

    /// Last recorded stamp, if a stamp counter was registered.
    pub fn stamp(&self) -> Option<i64> {
        self.is_live(CounterKind::Stamp)
            .then(|| self.counter(CounterKind::Stamp).get())
    }

    pub(crate) fn acquire(&self, kind: CounterKind) {
        self.live_mask.insert(kind);
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn release(&self) {
        let previous = self.ref_count.fetch_sub(1, Ordering::Relaxed);
        assert!(
            previous > 0,
            "counter cluster {} unregistered more often than registered",
            self.key
        );
    }

    /// Whether the cluster is stale and may be dropped.
    ///
    /// Only dynamic, unreferenced clusters carrying a stamp qualify, and only
    /// once the stamp is at least `lifetime` seconds older than `now`.
    pub fn is_expired(&self, now: i64, lifetime: i64) -> bool {
        if !self.dynamic || self.ref_count() > 0 {
            return false;
        }
        match self.stamp() {
            Some(stamp) => stamp <= now.saturating_sub(lifetime),
            None => false,
        }
    }

    /// Append one entry per live counter to `record`.
    pub fn format_into(&self, record: &mut StatsRecord) {
        let name = self.key.component.display_name();
        for kind in self.live_mask.kinds() {
            record.push(StatsEntry {
                name: name.clone(),
                kind,
                id: self.key.id.clone(),
                instance: self.key.instance.clone(),
                value: self.counter(kind).get(),
            });
        }
    }
}
