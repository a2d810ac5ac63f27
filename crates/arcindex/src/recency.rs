//! Recency-ordered key tracker.
//!
//! Keys are kept in a doubly linked list from most- to least-recently added.
//! `add` links a new key at the MRU end or moves an existing one there;
//! membership checks never reorder. `evict_lru` takes keys off the LRU end.
//!
//! ```text
//!   add a, add b, add c, add a
//!
//!   MRU                 LRU
//!   [a] ─── [c] ─── [b]
//!                    │
//!                    └── evict_lru() -> b
//! ```

use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::node::{Node, NodeList};
use crate::reclaim::{KeyHandle, ReclaimQueue, Reclaimed, WeakKey};
use crate::stats::IndexStats;
use crate::sweep::{self, Purge, WeakIndex};
use crate::traits::RecencyIndex;

/// Recency tracker with strongly held keys.
///
/// `contains` and `size` read the concurrent index without taking the
/// ordering lock.
pub struct RecencyTracker<K> {
    /// key -> slot in `order`
    index: DashMap<K, usize, RandomState>,
    order: Mutex<NodeList<K, ()>>,
    stats: IndexStats,
}

impl<K> RecencyTracker<K>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::build(IndexConfig::default())
    }

    /// Create an empty tracker with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(IndexConfig::default().with_initial_capacity(capacity))
    }

    /// Create an empty tracker from explicit settings
    pub fn with_config(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: IndexConfig) -> Self {
        Self {
            index: DashMap::with_capacity_and_hasher_and_shard_amount(
                config.initial_capacity,
                RandomState::new(),
                config.shard_amount,
            ),
            order: Mutex::new(NodeList::with_capacity(config.initial_capacity)),
            stats: IndexStats::new(),
        }
    }

    /// Link `key` at the MRU end, or move it there if already present
    pub fn add(&self, key: K) -> Result<()> {
        let mut order = self.order.lock();
        let existing = self.index.get(&key).map(|slot| *slot);
        match existing {
            Some(slot) => order.move_to_front(slot),
            None => {
                let slot = order.push_front(key.clone(), ());
                self.index.insert(key, slot);
                self.stats.record_insert();
            }
        }
        Ok(())
    }

    /// Whether `key` is tracked
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Stop tracking `key`; returns whether it was present
    pub fn remove(&self, key: &K) -> bool {
        let mut order = self.order.lock();
        match self.index.remove(key) {
            Some((_, slot)) => {
                order.remove(slot);
                self.stats.record_removal();
                true
            }
            None => false,
        }
    }

    /// Unlink and return the least-recently added key
    pub fn evict_lru(&self) -> Option<K> {
        let mut order = self.order.lock();
        let tail = order.tail()?;
        let node = order.remove(tail)?;
        self.index.remove(&node.key);
        self.stats.record_evictions(1);
        trace!("Evicted LRU key from slot {}", tail);
        Some(node.key)
    }

    /// Unlink every key satisfying `predicate`, in MRU-to-LRU order
    pub fn release_matching<F>(&self, mut predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        let mut order = self.order.lock();
        let victims: Vec<usize> = order
            .iter()
            .filter(|(_, node)| predicate(&node.key))
            .map(|(slot, _)| slot)
            .collect();

        for slot in &victims {
            if let Some(node) = order.remove(*slot) {
                self.index.remove(&node.key);
            }
        }

        if !victims.is_empty() {
            self.stats.record_evictions(victims.len() as u64);
            debug!("Released {} tracked keys", victims.len());
        }
    }

    /// Number of tracked keys
    pub fn size(&self) -> usize {
        self.index.len()
    }

    /// Whether no keys are tracked
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Snapshot of the keys from MRU to LRU
    pub fn keys(&self) -> Vec<K> {
        let order = self.order.lock();
        order.iter().map(|(_, node)| node.key.clone()).collect()
    }

    /// Stop tracking every key
    pub fn clear(&self) {
        let mut order = self.order.lock();
        let dropped = order.drain().len();
        self.index.clear();
        debug!("Cleared {} tracked keys", dropped);
    }

    /// Operation counters
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

impl<K> Default for RecencyTracker<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyIndex<K> for RecencyTracker<K>
where
    K: Hash + Eq + Clone,
{
    type Key = K;

    fn add(&self, key: K) -> Result<()> {
        RecencyTracker::add(self, key)
    }

    fn contains(&self, key: &K) -> bool {
        RecencyTracker::contains(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        RecencyTracker::remove(self, key)
    }

    fn evict_lru(&self) -> Option<K> {
        RecencyTracker::evict_lru(self)
    }

    fn release_matching<F>(&self, predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        RecencyTracker::release_matching(self, predicate)
    }

    fn size(&self) -> usize {
        RecencyTracker::size(self)
    }

    fn clear(&self) {
        RecencyTracker::clear(self)
    }
}

struct WeakRecencyState<K> {
    order: NodeList<WeakKey<K>, ()>,
    index: WeakIndex,
}

impl<K> WeakRecencyState<K> {
    fn unlink(&mut self, slot: usize) -> Option<Node<WeakKey<K>, ()>> {
        let node = self.order.remove(slot)?;
        self.index.remove(node.key.hash(), slot);
        Some(node)
    }
}

impl<K> Purge for WeakRecencyState<K> {
    fn purge(&mut self, reclaimed: Reclaimed) -> bool {
        if !self.order.is_current(reclaimed.slot, reclaimed.generation) {
            return false;
        }
        self.unlink(reclaimed.slot).is_some()
    }
}

/// Recency tracker that does not keep its keys alive.
///
/// Keys are added as [`KeyHandle`]s; a key whose last handle is dropped or
/// invalidated disappears from the next operation onward.
pub struct WeakRecencyTracker<K> {
    state: Mutex<WeakRecencyState<K>>,
    queue: Arc<ReclaimQueue>,
    stats: IndexStats,
}

impl<K> WeakRecencyTracker<K>
where
    K: Hash + Eq,
{
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::build(IndexConfig::default())
    }

    /// Create an empty tracker with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(IndexConfig::default().with_initial_capacity(capacity))
    }

    /// Create an empty tracker from explicit settings
    pub fn with_config(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: IndexConfig) -> Self {
        Self {
            state: Mutex::new(WeakRecencyState {
                order: NodeList::with_capacity(config.initial_capacity),
                index: WeakIndex::with_capacity(config.initial_capacity),
            }),
            queue: ReclaimQueue::new(),
            stats: IndexStats::new(),
        }
    }

    /// Link `key` at the MRU end, or move its live node there.
    ///
    /// A refreshed node keeps the handle it was first added with. Fails with
    /// [`Error::InvalidArgument`] if the handle was invalidated.
    pub fn add(&self, key: KeyHandle<K>) -> Result<()> {
        if key.is_invalidated() {
            return Err(Error::InvalidArgument("key handle was invalidated"));
        }
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);

        let existing = state
            .index
            .find(&state.order, key.key())
            .map(|(slot, _)| slot);
        if let Some(slot) = existing {
            state.order.move_to_front(slot);
            return Ok(());
        }

        let hash = state.index.hash_of(key.key());
        let slot = state.order.push_front(key.downgrade(hash), ());
        state.index.insert(hash, slot);
        let generation = state.order.generation(slot);
        if !key.watch(&self.queue, slot, generation) {
            self.queue.push(Reclaimed { slot, generation });
        }
        self.stats.record_insert();
        Ok(())
    }

    /// Whether `key` is tracked and still alive
    pub fn contains(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        state.index.find(&state.order, key).is_some()
    }

    /// Stop tracking `key`; returns whether it was present
    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        let Some((slot, handle)) = state.index.find(&state.order, key) else {
            return false;
        };
        let generation = state.order.generation(slot);
        state.unlink(slot);
        handle.unwatch(&self.queue, slot, generation);
        self.stats.record_removal();
        true
    }

    /// Unlink and return the least-recently added live key.
    ///
    /// Reclaimed nodes met on the way from the LRU end are purged.
    pub fn evict_lru(&self) -> Option<KeyHandle<K>> {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);

        let mut purged = 0;
        let evicted = loop {
            let Some(tail) = state.order.tail() else {
                break None;
            };
            let generation = state.order.generation(tail);
            let live = state.order.get(tail).and_then(|node| node.key.upgrade());
            state.unlink(tail);
            match live {
                Some(handle) => {
                    handle.unwatch(&self.queue, tail, generation);
                    break Some(handle);
                }
                None => purged += 1,
            }
        };

        if purged > 0 {
            self.stats.record_purged(purged);
            trace!("Skipped {} reclaimed keys at the LRU end", purged);
        }
        if evicted.is_some() {
            self.stats.record_evictions(1);
        }
        evicted
    }

    /// Unlink every live key satisfying `predicate`, in MRU-to-LRU order
    pub fn release_matching<F>(&self, mut predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);

        let mut victims = Vec::new();
        let mut stale = Vec::new();
        for (slot, node) in state.order.iter() {
            match node.key.upgrade() {
                Some(handle) => {
                    if predicate(handle.key()) {
                        victims.push((slot, state.order.generation(slot), handle));
                    }
                }
                None => stale.push(slot),
            }
        }

        for slot in &stale {
            state.unlink(*slot);
        }
        for (slot, generation, handle) in &victims {
            state.unlink(*slot);
            handle.unwatch(&self.queue, *slot, *generation);
        }

        if !stale.is_empty() {
            self.stats.record_purged(stale.len() as u64);
        }
        if !victims.is_empty() {
            self.stats.record_evictions(victims.len() as u64);
            debug!("Released {} weakly tracked keys", victims.len());
        }
    }

    /// Number of live tracked keys
    pub fn size(&self) -> usize {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        state.order.len()
    }

    /// Whether no live keys are tracked
    pub fn is_empty(&self) -> bool {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        state.order.is_empty()
    }

    /// Handles for the live keys from MRU to LRU
    pub fn keys(&self) -> Vec<KeyHandle<K>> {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        state
            .order
            .iter()
            .filter_map(|(_, node)| node.key.upgrade())
            .collect()
    }

    /// Stop tracking every key
    pub fn clear(&self) {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        let nodes = state.order.drain();
        state.index.clear();
        for (slot, generation, node) in &nodes {
            if let Some(handle) = node.key.upgrade() {
                handle.unwatch(&self.queue, *slot, *generation);
            }
        }
        debug!("Cleared {} weakly tracked keys", nodes.len());
    }

    /// Operation counters
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

impl<K> Default for WeakRecencyTracker<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyIndex<K> for WeakRecencyTracker<K>
where
    K: Hash + Eq,
{
    type Key = KeyHandle<K>;

    fn add(&self, key: KeyHandle<K>) -> Result<()> {
        WeakRecencyTracker::add(self, key)
    }

    fn contains(&self, key: &K) -> bool {
        WeakRecencyTracker::contains(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        WeakRecencyTracker::remove(self, key)
    }

    fn evict_lru(&self) -> Option<KeyHandle<K>> {
        WeakRecencyTracker::evict_lru(self)
    }

    fn release_matching<F>(&self, predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        WeakRecencyTracker::release_matching(self, predicate)
    }

    fn size(&self) -> usize {
        WeakRecencyTracker::size(self)
    }

    fn clear(&self) {
        WeakRecencyTracker::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_basic() {
        let tracker = RecencyTracker::new();
        tracker.add("a").unwrap();
        tracker.add("b").unwrap();

        assert!(tracker.contains(&"a"));
        assert!(!tracker.contains(&"z"));
        assert_eq!(tracker.size(), 2);
        assert_eq!(tracker.keys(), vec!["b", "a"]);
    }

    #[test]
    fn test_recency_refresh() {
        let tracker = RecencyTracker::new();
        tracker.add("a").unwrap();
        tracker.add("b").unwrap();
        tracker.add("c").unwrap();
        tracker.add("a").unwrap();

        assert_eq!(tracker.size(), 3);
        assert_eq!(tracker.evict_lru(), Some("b"));
        assert_eq!(tracker.evict_lru(), Some("c"));
        assert_eq!(tracker.evict_lru(), Some("a"));
        assert_eq!(tracker.evict_lru(), None);
    }

    #[test]
    fn test_recency_contains_does_not_reorder() {
        let tracker = RecencyTracker::new();
        tracker.add(1).unwrap();
        tracker.add(2).unwrap();

        assert!(tracker.contains(&1));
        assert_eq!(tracker.evict_lru(), Some(1));
    }

    #[test]
    fn test_recency_remove() {
        let tracker = RecencyTracker::new();
        tracker.add(1).unwrap();
        tracker.add(2).unwrap();
        tracker.add(3).unwrap();

        assert!(tracker.remove(&2));
        assert!(!tracker.remove(&2));
        assert_eq!(tracker.size(), 2);
        assert_eq!(tracker.keys(), vec![3, 1]);
    }

    #[test]
    fn test_recency_release_matching() {
        let tracker = RecencyTracker::new();
        for i in 0..6u32 {
            tracker.add(i).unwrap();
        }

        let mut seen = Vec::new();
        tracker.release_matching(|k| {
            seen.push(*k);
            *k >= 3
        });

        assert_eq!(seen, vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(tracker.keys(), vec![2, 1, 0]);
        assert!(!tracker.contains(&4));
        assert_eq!(tracker.stats().evictions(), 3);
    }

    #[test]
    fn test_recency_clear() {
        let tracker = RecencyTracker::new();
        tracker.add(1).unwrap();
        tracker.add(2).unwrap();
        tracker.clear();

        assert_eq!(tracker.size(), 0);
        assert!(!tracker.contains(&1));
        assert_eq!(tracker.evict_lru(), None);

        tracker.add(3).unwrap();
        assert_eq!(tracker.keys(), vec![3]);
    }

    #[test]
    fn test_weak_recency_refresh() {
        let tracker = WeakRecencyTracker::new();
        let a = KeyHandle::new("a");
        let b = KeyHandle::new("b");
        let c = KeyHandle::new("c");
        tracker.add(a.clone()).unwrap();
        tracker.add(b.clone()).unwrap();
        tracker.add(c.clone()).unwrap();
        tracker.add(a.clone()).unwrap();

        assert_eq!(tracker.size(), 3);
        let evicted = tracker.evict_lru().unwrap();
        assert!(KeyHandle::ptr_eq(&evicted, &b));
        assert_eq!(b.watcher_count(), 0);
    }

    #[test]
    fn test_weak_recency_dropped_key_is_purged() {
        let tracker = WeakRecencyTracker::new();
        let a = KeyHandle::new(1u32);
        let b = KeyHandle::new(2u32);
        tracker.add(a.clone()).unwrap();
        tracker.add(b.clone()).unwrap();

        drop(a);
        assert!(!tracker.contains(&1));
        assert_eq!(tracker.size(), 1);
        assert_eq!(tracker.stats().purged(), 1);
        assert_eq!(tracker.evict_lru().map(|h| *h), Some(2));
    }

    #[test]
    fn test_weak_recency_evict_after_reclaimed_keys() {
        let tracker = WeakRecencyTracker::new();
        let keep = KeyHandle::new(0u32);
        tracker.add(keep.clone()).unwrap();
        for i in 1..5u32 {
            tracker.add(KeyHandle::new(i)).unwrap();
        }
        // Invalidated without dropping: the queue still gets told
        let late = KeyHandle::new(9u32);
        tracker.add(late.clone()).unwrap();
        late.invalidate();

        assert_eq!(tracker.evict_lru().map(|h| *h), Some(0));
        assert_eq!(tracker.evict_lru(), None);
        assert_eq!(tracker.size(), 0);
    }

    #[test]
    fn test_weak_recency_invalidated_handle_rejected() {
        let tracker = WeakRecencyTracker::new();
        let a = KeyHandle::new(1u32);
        a.invalidate();
        assert!(matches!(tracker.add(a), Err(Error::InvalidArgument(_))));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_weak_recency_remove_and_release() {
        let tracker = WeakRecencyTracker::new();
        let handles: Vec<_> = (0..4u32).map(KeyHandle::new).collect();
        for handle in &handles {
            tracker.add(handle.clone()).unwrap();
        }

        assert!(tracker.remove(&1));
        assert!(!tracker.remove(&1));
        tracker.release_matching(|k| *k == 3);

        let keys: Vec<u32> = tracker.keys().iter().map(|h| **h).collect();
        assert_eq!(keys, vec![2, 0]);
    }

    #[test]
    fn test_weak_recency_clear() {
        let tracker = WeakRecencyTracker::new();
        let a = KeyHandle::new(1u32);
        tracker.add(a.clone()).unwrap();
        tracker.clear();

        assert!(!tracker.contains(&1));
        assert_eq!(a.watcher_count(), 0);
        assert_eq!(tracker.evict_lru(), None);
    }
}
