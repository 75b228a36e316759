//! Counter kinds and atomically updated counter values.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

/// The kind of a counter within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKind {
    /// Records dropped by the component
    Dropped = 0,
    /// Records processed by the component
    Processed = 1,
    /// Records currently held in a queue
    Stored = 2,
    /// Records suppressed as duplicates
    Suppressed = 3,
    /// Unix timestamp (seconds) of the last update, used for expiry
    Stamp = 4,
}

impl CounterKind {
    /// Number of counter kinds; the size of a cluster's counter array.
    pub const COUNT: usize = 5;

    /// Every counter kind, in index order.
    pub const ALL: [CounterKind; CounterKind::COUNT] = [
        CounterKind::Dropped,
        CounterKind::Processed,
        CounterKind::Stored,
        CounterKind::Suppressed,
        CounterKind::Stamp,
    ];

    /// Index into a cluster's counter array.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name used in published statistics.
    pub fn name(self) -> &'static str {
        match self {
            CounterKind::Dropped => "dropped",
            CounterKind::Processed => "processed",
            CounterKind::Stored => "stored",
            CounterKind::Suppressed => "suppressed",
            CounterKind::Stamp => "stamp",
        }
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single counter value.
///
/// Updated with relaxed atomics: increments from different threads are never
/// lost, but no ordering is implied between distinct counters.
#[derive(Debug, Default)]
pub struct CounterValue {
    value: AtomicI64,
}

impl CounterValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Bitmask of the counter kinds registered on a cluster.
#[derive(Debug, Default)]
pub struct LiveMask(AtomicU8);

impl LiveMask {
    pub fn insert(&self, kind: CounterKind) {
        self.0.fetch_or(kind.bit(), Ordering::Relaxed);
    }

    pub fn contains(&self, kind: CounterKind) -> bool {
        self.0.load(Ordering::Relaxed) & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0.load(Ordering::Relaxed) == 0
    }

    /// Live kinds in index order.
    pub fn kinds(&self) -> impl Iterator<Item = CounterKind> {
        let mask = self.0.load(Ordering::Relaxed);
        CounterKind::ALL
            .into_iter()
            .filter(move |kind| mask & kind.bit() != 0)
    }
}
