//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::summary::StatsRecord;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Instant;

/// Port for obtaining current time.
///
/// Token buckets measure elapsed time on the monotonic clock; counter stamps
/// and expiry use wall-clock seconds since the Unix epoch.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current monotonic instant.
    fn now(&self) -> Instant;

    /// Get the current wall-clock time in seconds since the Unix epoch.
    fn unix_time(&self) -> i64;
}

/// Port for concurrent key-value storage.
///
/// Lookup-or-create happens in one critical section, so two threads seeing a
/// key for the first time end up sharing one value. Values are handed out by
/// clone (typically an `Arc`) so no map lock is held while the caller works
/// with them.
/// Infrastructure provides concrete implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Return the value for `key`, inserting `factory()` if it is absent.
    fn get_or_insert_with<Q, F>(&self, key: &Q, factory: F) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> V;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);
}

/// Port for handing statistics records to an outbound channel.
///
/// Called once per maintenance pass, outside the registry lock.
pub trait Publisher: Send + Sync + Debug {
    fn publish(&self, record: StatsRecord);
}
