//! Storage implementations for throttle buckets.
//!
//! Provides concurrent, sharded storage for per-key state.

use crate::application::ports::Storage;
use ahash::RandomState;
use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// Thread-safe sharded storage backed by DashMap.
///
/// Each shard lock plays the role of the map lock: lookups and inserts for
/// one key are serialized on its shard, while keys on other shards proceed
/// in parallel.
#[derive(Debug)]
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash,
{
    map: DashMap<K, V, RandomState>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash,
{
    /// Create a new sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Check if a key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync + std::fmt::Debug,
{
    fn get_or_insert_with<Q, F>(&self, key: &Q, factory: F) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> V,
    {
        // Shared read lock on the hot path; only a miss needs the write lock
        if let Some(value) = self.map.get(key) {
            return value.clone();
        }
        self.map
            .entry(key.to_owned())
            .or_insert_with(factory)
            .value()
            .clone()
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&self) {
        self.map.clear()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.map.iter() {
            f(entry.key(), entry.value());
        }
    }
}

// Lets filter clones share one bucket map
impl<K, V> Storage<K, V> for Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync + std::fmt::Debug,
{
    fn get_or_insert_with<Q, F>(&self, key: &Q, factory: F) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> V,
    {
        (**self).get_or_insert_with(key, factory)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        (**self).for_each(f)
    }
}
