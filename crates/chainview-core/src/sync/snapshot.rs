//! Copy-on-write versioned concurrent map.
//!
//! Writers clone the current map, apply their mutation, and atomically swap
//! in the new version under a write lock. Readers take an `Arc` of whichever
//! version is current and iterate it without holding any lock — a snapshot
//! is consistent (never half-mutated) but may be stale by the time it is
//! walked, which is exactly the contract the registry's fan-out and GC
//! passes need.

use std::hash::Hash;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::RwLock;

/// Versioned map with lock-free consistent snapshots.
pub struct SnapshotMap<K, V> {
    current: RwLock<Arc<FxHashMap<K, V>>>,
}

impl<K, V> SnapshotMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(FxHashMap::default())),
        }
    }

    /// Point lookup against the current version.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.current.read().get(key).cloned()
    }

    /// Returns the current version for iteration.
    ///
    /// The snapshot never blocks concurrent point operations; writers that
    /// run while it is held simply produce newer versions.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FxHashMap<K, V>> {
        Arc::clone(&self.current.read())
    }

    /// Inserts `value` if `key` is absent. Returns `false` if it was taken.
    pub fn try_insert(&self, key: K, value: V) -> bool {
        let mut current = self.current.write();
        if current.contains_key(&key) {
            return false;
        }
        let mut next = FxHashMap::clone(&current);
        next.insert(key, value);
        *current = Arc::new(next);
        true
    }

    /// Removes and returns the value under `key`, if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut current = self.current.write();
        if !current.contains_key(key) {
            return None;
        }
        let mut next = FxHashMap::clone(&current);
        let removed = next.remove(key);
        *current = Arc::new(next);
        removed
    }

    /// Empties the map, returning every entry.
    pub fn drain(&self) -> Vec<(K, V)> {
        let mut current = self.current.write();
        let drained = current.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        *current = Arc::new(FxHashMap::default());
        drained
    }

    /// Number of entries in the current version.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// Whether the current version is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for SnapshotMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
