//! Central registry of counter clusters.
//!
//! The registry maps cluster identities to clusters under one coarse lock.
//! The lock only guards the map structure: creating, finding, removing and
//! iterating clusters. Counter updates go straight to the atomics through a
//! [`CounterHandle`] and never take the lock.
//!
//! Several operations can be batched under one lock acquisition with
//! [`StatsRegistry::lock`].

use crate::domain::cluster::{ClusterKey, StatsCluster};
use crate::domain::counter::CounterKind;
use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;

type ClusterMap = HashMap<ClusterKey, Arc<StatsCluster>, RandomState>;

/// A registered counter.
///
/// Holding a handle keeps the cluster referenced, which protects it from
/// pruning. Give it back with [`StatsRegistry::unregister_counter`]; a
/// handle dropped without unregistering keeps its cluster alive for good.
#[derive(Debug)]
#[must_use = "an unregistered handle keeps its cluster referenced"]
pub struct CounterHandle {
    cluster: Arc<StatsCluster>,
    kind: CounterKind,
}

impl CounterHandle {
    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    pub fn key(&self) -> &ClusterKey {
        self.cluster.key()
    }

    pub fn inc(&self) {
        self.cluster.counter(self.kind).inc();
    }

    pub fn dec(&self) {
        self.cluster.counter(self.kind).dec();
    }

    pub fn add(&self, delta: i64) {
        self.cluster.counter(self.kind).add(delta);
    }

    pub fn set(&self, value: i64) {
        self.cluster.counter(self.kind).set(value);
    }

    pub fn get(&self) -> i64 {
        self.cluster.counter(self.kind).get()
    }

    /// The cluster this counter belongs to, for touching sibling counters.
    pub fn cluster(&self) -> &StatsCluster {
        &self.cluster
    }
}

/// Registry of all counter clusters of a process.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    clusters: Mutex<ClusterMap>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the registry lock for a batch of operations.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            clusters: self.clusters.lock(),
        }
    }

    /// Register a counter on a static cluster, creating the cluster if needed.
    pub fn register_counter(&self, key: ClusterKey, kind: CounterKind) -> CounterHandle {
        self.lock().register_counter(key, kind, false)
    }

    /// Register a counter on a dynamic cluster, which may be pruned once unreferenced and stale.
    pub fn register_dynamic_counter(&self, key: ClusterKey, kind: CounterKind) -> CounterHandle {
        self.lock().register_counter(key, kind, true)
    }

    pub fn unregister_counter(&self, handle: CounterHandle) {
        self.lock().unregister_counter(handle);
    }

    /// Visit every cluster and remove those for which `f` returns true.
    ///
    /// Returns the number of clusters removed.
    pub fn foreach_remove<F>(&self, f: F) -> usize
    where
        F: FnMut(&StatsCluster) -> bool,
    {
        self.lock().foreach_remove(f)
    }

    /// Iterate over all clusters with a callback.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&StatsCluster),
    {
        self.lock().for_each(f);
    }

    /// Look up a cluster by identity.
    pub fn get(&self, key: &ClusterKey) -> Option<Arc<StatsCluster>> {
        self.lock().get(key)
    }

    pub fn contains(&self, key: &ClusterKey) -> bool {
        self.lock().contains(key)
    }

    /// Get the number of registered clusters.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cluster. Outstanding handles keep their cluster memory alive
    /// but it is no longer reachable from the registry.
    pub fn clear(&self) {
        self.lock().clusters.clear();
    }
}

/// Exclusive access to the registry map.
pub struct RegistryGuard<'a> {
    clusters: MutexGuard<'a, ClusterMap>,
}

impl RegistryGuard<'_> {
    /// Find or create the cluster for `key`, mark `kind` live and take a reference.
    ///
    /// A cluster keeps the `dynamic` flag it was created with.
    pub fn register_counter(
        &mut self,
        key: ClusterKey,
        kind: CounterKind,
        dynamic: bool,
    ) -> CounterHandle {
        let cluster = self
            .clusters
            .entry(key)
            .or_insert_with_key(|key| {
                tracing::debug!(cluster = %key, dynamic, "creating stats cluster");
                Arc::new(StatsCluster::new(key.clone(), dynamic))
            })
            .clone();

        debug_assert_eq!(
            cluster.is_dynamic(),
            dynamic,
            "cluster {} registered as both dynamic and static",
            cluster.key()
        );

        cluster.acquire(kind);
        CounterHandle { cluster, kind }
    }

    /// Drop the reference held by `handle`.
    pub fn unregister_counter(&mut self, handle: CounterHandle) {
        debug_assert!(
            handle.cluster.is_live(handle.kind),
            "counter {} was never registered",
            handle.kind
        );
        debug_assert!(
            self.clusters
                .get(handle.cluster.key())
                .map(|c| Arc::ptr_eq(c, &handle.cluster))
                .unwrap_or(false),
            "cluster {} is no longer in the registry",
            handle.cluster.key()
        );
        handle.cluster.release();
    }

    /// Visit every cluster and remove those for which `f` returns true.
    pub fn foreach_remove<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&StatsCluster) -> bool,
    {
        let before = self.clusters.len();
        self.clusters.retain(|key, cluster| {
            let remove = f(cluster);
            if remove {
                tracing::debug!(cluster = %key, "removing stats cluster");
            }
            !remove
        });
        before - self.clusters.len()
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&StatsCluster),
    {
        for cluster in self.clusters.values() {
            f(cluster);
        }
    }

    pub fn get(&self, key: &ClusterKey) -> Option<Arc<StatsCluster>> {
        self.clusters.get(key).cloned()
    }

    pub fn contains(&self, key: &ClusterKey) -> bool {
        self.clusters.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}
