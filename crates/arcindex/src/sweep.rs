//! Stale-entry reconciliation shared by the weak-mode structures.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use ahash::RandomState;
use tracing::debug;

use crate::node::NodeList;
use crate::reclaim::{KeyHandle, ReclaimQueue, Reclaimed, WeakKey};
use crate::stats::IndexStats;

/// Structure state that can unlink a node named by a [`Reclaimed`] message
pub(crate) trait Purge {
    /// Unlink the node if `reclaimed` still names it; report whether it did
    fn purge(&mut self, reclaimed: Reclaimed) -> bool;
}

/// Drain `queue` and purge every node it names. Returns how many were unlinked.
pub(crate) fn sweep<T: Purge>(queue: &ReclaimQueue, target: &mut T, stats: &IndexStats) -> u64 {
    let mut purged = 0;
    for reclaimed in queue.drain() {
        if target.purge(reclaimed) {
            purged += 1;
        }
    }
    if purged > 0 {
        stats.record_purged(purged);
        debug!("Purged {} reclaimed entries", purged);
    }
    purged
}

/// Hash index over weakly held keys.
///
/// A reclaimed key can no longer be hashed or compared, so nodes are
/// bucketed by the hash computed when they were linked and matched by
/// upgrading their key.
#[derive(Debug)]
pub(crate) struct WeakIndex {
    buckets: HashMap<u64, Vec<usize>, RandomState>,
    hasher: RandomState,
}

impl WeakIndex {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            hasher: RandomState::new(),
        }
    }

    pub(crate) fn hash_of<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    pub(crate) fn insert(&mut self, hash: u64, slot: usize) {
        self.buckets.entry(hash).or_default().push(slot);
    }

    pub(crate) fn remove(&mut self, hash: u64, slot: usize) {
        if let Some(slots) = self.buckets.get_mut(&hash) {
            slots.retain(|&s| s != slot);
            if slots.is_empty() {
                self.buckets.remove(&hash);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Most recently linked live node whose key equals `key`, with a
    /// transient hold on that key
    pub(crate) fn find<K, P>(
        &self,
        list: &NodeList<WeakKey<K>, P>,
        key: &K,
    ) -> Option<(usize, KeyHandle<K>)>
    where
        K: Hash + Eq,
    {
        let slots = self.buckets.get(&self.hash_of(key))?;
        slots.iter().rev().find_map(|&slot| {
            let handle = list.get(slot)?.key.upgrade()?;
            (*handle == *key).then_some((slot, handle))
        })
    }
}
