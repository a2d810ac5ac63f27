//! Clock-ordered associative cache.
//!
//! Entries form a ring with one distinguished position, the cursor. `put`
//! links new entries immediately before the cursor and `next` returns the
//! entry under the cursor and steps past it, so one full revolution of
//! `next` visits every entry present when it started exactly once, while
//! entries added during the revolution wait for the following one.
//!
//! ```text
//!   put 1, put 2, put 3            next() -> 1
//!
//!   head                           head
//!    │                              │
//!    ▼                              ▼
//!   [2] ─ [3] ─ [1]                [2] ─ [3] ─ [1]
//!                ▲                  ▲
//!              cursor             cursor (wrapped from tail)
//! ```
//!
//! Two backends share the ring:
//! - [`ClockCache`] keeps keys alive. Values live in a sharded concurrent
//!   map, so `get`, `contains` and `size` never take the ring lock.
//! - [`WeakClockCache`] holds keys through [`KeyHandle`]s it does not own.
//!   Every operation takes one lock and first purges entries whose keys
//!   were reclaimed.

use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
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
use crate::traits::ClockIndex;

/// Node list plus the rotating cursor
#[derive(Debug)]
struct Ring<S, P> {
    list: NodeList<S, P>,
    /// `None` only while the list is empty
    cursor: Option<usize>,
}

impl<S, P> Ring<S, P> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            list: NodeList::with_capacity(capacity),
            cursor: None,
        }
    }

    fn insert(&mut self, key: S, payload: P) -> usize {
        match self.cursor {
            Some(cursor) => self.list.insert_before(cursor, key, payload),
            None => {
                let idx = self.list.push_back(key, payload);
                self.cursor = Some(idx);
                idx
            }
        }
    }

    /// Slot under the cursor; the cursor moves to its successor, wrapping
    /// from the tail to the head
    fn advance(&mut self) -> Option<usize> {
        let current = self.cursor?;
        self.cursor = self.successor(current);
        Some(current)
    }

    fn unlink(&mut self, idx: usize) -> Option<Node<S, P>> {
        if self.cursor == Some(idx) {
            self.cursor = self.successor(idx).filter(|&next| next != idx);
        }
        self.list.remove(idx)
    }

    fn drain(&mut self) -> Vec<(usize, u64, Node<S, P>)> {
        self.cursor = None;
        self.list.drain()
    }

    /// Every slot once, starting at the cursor and following sweep order
    fn order(&self) -> Vec<usize> {
        let mut slots = Vec::with_capacity(self.list.len());
        let Some(start) = self.cursor else {
            return slots;
        };
        let mut current = start;
        loop {
            slots.push(current);
            match self.successor(current) {
                Some(next) if next != start => current = next,
                _ => break,
            }
        }
        slots
    }

    fn successor(&self, idx: usize) -> Option<usize> {
        self.list.next_of(idx).or(self.list.head())
    }
}

/// Clock cache with strongly held keys.
///
/// Point lookups read the concurrent index directly; `put`, `remove`,
/// `next`, `release_matching` and `clear` serialize on the ring lock.
pub struct ClockCache<K, V> {
    /// key -> entries in insertion order, as `(slot, value)`
    index: DashMap<K, Vec<(usize, V)>, RandomState>,
    ring: Mutex<Ring<K, ()>>,
    len: AtomicUsize,
    stats: IndexStats,
}

impl<K, V> ClockCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self::build(IndexConfig::default())
    }

    /// Create an empty cache with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(IndexConfig::default().with_initial_capacity(capacity))
    }

    /// Create an empty cache from explicit settings
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
            ring: Mutex::new(Ring::with_capacity(config.initial_capacity)),
            len: AtomicUsize::new(0),
            stats: IndexStats::new(),
        }
    }

    /// Link a new entry immediately before the cursor.
    ///
    /// Does not replace an existing entry for `key`: the cache then holds
    /// two entries, `get` and `remove` address the newer one, and `next`
    /// visits both. Call `remove` first for one entry per key.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let mut ring = self.ring.lock();
        let slot = ring.insert(key.clone(), ());
        self.index.entry(key).or_default().push((slot, value));
        self.len.fetch_add(1, Ordering::Release);
        self.stats.record_insert();
        Ok(())
    }

    /// Value of the newest entry for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.index.get(key)?;
        entries.last().map(|(_, value)| value.clone())
    }

    /// Whether `key` has a live entry
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Unlink the newest entry for `key` and return its value
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut ring = self.ring.lock();
        let (slot, value, drained) = {
            let mut entries = self.index.get_mut(key)?;
            let (slot, value) = entries.pop()?;
            (slot, value, entries.is_empty())
        };
        if drained {
            self.index.remove_if(key, |_, entries| entries.is_empty());
        }
        ring.unlink(slot);
        self.len.fetch_sub(1, Ordering::Release);
        self.stats.record_removal();
        Some(value)
    }

    /// Unlink every entry whose key satisfies `predicate`, visiting entries
    /// in sweep order from the cursor
    pub fn release_matching<F>(&self, mut predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        let mut ring = self.ring.lock();
        let victims: Vec<(usize, K)> = ring
            .order()
            .into_iter()
            .filter_map(|slot| {
                let key = &ring.list.get(slot)?.key;
                predicate(key).then(|| (slot, key.clone()))
            })
            .collect();

        for (slot, key) in &victims {
            ring.unlink(*slot);
            self.detach(key, *slot);
        }

        if !victims.is_empty() {
            self.len.fetch_sub(victims.len(), Ordering::Release);
            self.stats.record_evictions(victims.len() as u64);
            debug!("Released {} clock entries", victims.len());
        }
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Return a copy of the entry under the cursor and advance the cursor
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<(K, V)> {
        let mut ring = self.ring.lock();
        let slot = ring.advance()?;
        let key = ring.list.get(slot)?.key.clone();
        let value = self
            .index
            .get(&key)?
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, value)| value.clone())?;
        self.stats.record_advance();
        Some((key, value))
    }

    /// Unlink every entry
    pub fn clear(&self) {
        let mut ring = self.ring.lock();
        let dropped = ring.drain().len();
        self.index.clear();
        self.len.store(0, Ordering::Release);
        debug!("Cleared {} clock entries", dropped);
    }

    /// Operation counters
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    fn detach(&self, key: &K, slot: usize) {
        let drained = match self.index.get_mut(key) {
            Some(mut entries) => {
                entries.retain(|(s, _)| *s != slot);
                entries.is_empty()
            }
            None => false,
        };
        if drained {
            self.index.remove_if(key, |_, entries| entries.is_empty());
        }
    }
}

impl<K, V> Default for ClockCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ClockIndex<K, V> for ClockCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    type Key = K;

    fn put(&self, key: K, value: V) -> Result<()> {
        ClockCache::put(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        ClockCache::get(self, key)
    }

    fn remove(&self, key: &K) -> Option<V> {
        ClockCache::remove(self, key)
    }

    fn release_matching<F>(&self, predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        ClockCache::release_matching(self, predicate)
    }

    fn size(&self) -> usize {
        ClockCache::size(self)
    }

    fn next(&self) -> Option<(K, V)> {
        ClockCache::next(self)
    }

    fn clear(&self) {
        ClockCache::clear(self)
    }
}

struct WeakClockState<K, V> {
    ring: Ring<WeakKey<K>, V>,
    index: WeakIndex,
}

impl<K, V> WeakClockState<K, V> {
    fn unlink(&mut self, slot: usize) -> Option<Node<WeakKey<K>, V>> {
        let node = self.ring.unlink(slot)?;
        self.index.remove(node.key.hash(), slot);
        Some(node)
    }
}

impl<K, V> Purge for WeakClockState<K, V> {
    fn purge(&mut self, reclaimed: Reclaimed) -> bool {
        if !self.ring.list.is_current(reclaimed.slot, reclaimed.generation) {
            return false;
        }
        self.unlink(reclaimed.slot).is_some()
    }
}

/// Clock cache that does not keep its keys alive.
///
/// Keys are added as [`KeyHandle`]s. Once the caller drops its last handle
/// for a key, or invalidates it, the entry is gone from the next operation
/// onward. `next` hands back a fresh handle so the key cannot vanish while
/// the caller inspects it.
pub struct WeakClockCache<K, V> {
    state: Mutex<WeakClockState<K, V>>,
    queue: Arc<ReclaimQueue>,
    stats: IndexStats,
}

impl<K, V> WeakClockCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self::build(IndexConfig::default())
    }

    /// Create an empty cache with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(IndexConfig::default().with_initial_capacity(capacity))
    }

    /// Create an empty cache from explicit settings
    pub fn with_config(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: IndexConfig) -> Self {
        Self {
            state: Mutex::new(WeakClockState {
                ring: Ring::with_capacity(config.initial_capacity),
                index: WeakIndex::with_capacity(config.initial_capacity),
            }),
            queue: ReclaimQueue::new(),
            stats: IndexStats::new(),
        }
    }

    /// Link a new entry for `key` immediately before the cursor.
    ///
    /// Fails with [`Error::InvalidArgument`] if the handle was invalidated.
    /// As with [`ClockCache::put`], an existing entry is not replaced.
    pub fn put(&self, key: KeyHandle<K>, value: V) -> Result<()> {
        if key.is_invalidated() {
            return Err(Error::InvalidArgument("key handle was invalidated"));
        }
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);

        let hash = state.index.hash_of(key.key());
        let slot = state.ring.insert(key.downgrade(hash), value);
        state.index.insert(hash, slot);
        let generation = state.ring.list.generation(slot);
        if !key.watch(&self.queue, slot, generation) {
            self.queue.push(Reclaimed { slot, generation });
        }
        self.stats.record_insert();
        Ok(())
    }

    /// Value of the newest live entry for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        let (slot, _handle) = state.index.find(&state.ring.list, key)?;
        state.ring.list.get(slot).map(|node| node.payload.clone())
    }

    /// Whether `key` has a live entry
    pub fn contains(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        state.index.find(&state.ring.list, key).is_some()
    }

    /// Unlink the newest live entry for `key` and return its value
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        let (slot, handle) = state.index.find(&state.ring.list, key)?;
        let generation = state.ring.list.generation(slot);
        let node = state.unlink(slot)?;
        handle.unwatch(&self.queue, slot, generation);
        self.stats.record_removal();
        Some(node.payload)
    }

    /// Unlink every live entry whose key satisfies `predicate`, visiting
    /// entries in sweep order from the cursor
    pub fn release_matching<F>(&self, mut predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);

        let mut victims = Vec::new();
        let mut stale = Vec::new();
        for slot in state.ring.order() {
            let Some(node) = state.ring.list.get(slot) else {
                continue;
            };
            match node.key.upgrade() {
                Some(handle) => {
                    if predicate(handle.key()) {
                        victims.push((slot, state.ring.list.generation(slot), handle));
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
            debug!("Released {} weak clock entries", victims.len());
        }
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        state.ring.list.len()
    }

    /// Whether the cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Return the entry under the cursor and advance the cursor.
    ///
    /// Entries whose key vanished since the last sweep are purged on the
    /// way; `None` once a whole revolution finds nothing live.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<(KeyHandle<K>, V)> {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);

        let mut budget = state.ring.list.len();
        while budget > 0 {
            budget -= 1;
            let slot = state.ring.advance()?;
            let live = {
                let node = state.ring.list.get(slot)?;
                node.key
                    .upgrade()
                    .map(|handle| (handle, node.payload.clone()))
            };
            match live {
                Some(entry) => {
                    self.stats.record_advance();
                    return Some(entry);
                }
                None => {
                    trace!("Skipping reclaimed clock entry at slot {}", slot);
                    state.unlink(slot);
                    self.stats.record_purged(1);
                }
            }
        }
        None
    }

    /// Unlink every entry
    pub fn clear(&self) {
        let mut state = self.state.lock();
        sweep::sweep(&self.queue, &mut *state, &self.stats);
        let nodes = state.ring.drain();
        state.index.clear();
        for (slot, generation, node) in &nodes {
            if let Some(handle) = node.key.upgrade() {
                handle.unwatch(&self.queue, *slot, *generation);
            }
        }
        debug!("Cleared {} weak clock entries", nodes.len());
    }

    /// Operation counters
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

impl<K, V> Default for WeakClockCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ClockIndex<K, V> for WeakClockCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    type Key = KeyHandle<K>;

    fn put(&self, key: KeyHandle<K>, value: V) -> Result<()> {
        WeakClockCache::put(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        WeakClockCache::get(self, key)
    }

    fn remove(&self, key: &K) -> Option<V> {
        WeakClockCache::remove(self, key)
    }

    fn release_matching<F>(&self, predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        WeakClockCache::release_matching(self, predicate)
    }

    fn size(&self) -> usize {
        WeakClockCache::size(self)
    }

    fn next(&self) -> Option<(KeyHandle<K>, V)> {
        WeakClockCache::next(self)
    }

    fn clear(&self) {
        WeakClockCache::clear(self)
    }
}
