//! Key handles for weak-mode structures and their reclamation queue.
//!
//! A weak structure never keeps a key alive. The caller owns the key through
//! a [`KeyHandle`]; the structure keeps only a [`WeakKey`]. Whenever a node
//! is linked, the handle records which queue to notify and which
//! `(slot, generation)` the node occupies. Dropping the last handle, or
//! calling [`KeyHandle::invalidate`], posts a [`Reclaimed`] message to each
//! registered queue. Structures drain their queue at the start of every
//! operation and unlink the nodes it names.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Notification that the key of node `(slot, generation)` is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reclaimed {
    pub(crate) slot: usize,
    pub(crate) generation: u64,
}

/// Per-structure inbox of [`Reclaimed`] messages
#[derive(Debug, Default)]
pub(crate) struct ReclaimQueue {
    pending: Mutex<Vec<Reclaimed>>,
    has_pending: AtomicBool,
}

impl ReclaimQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push(&self, reclaimed: Reclaimed) {
        let mut pending = self.pending.lock();
        pending.push(reclaimed);
        self.has_pending.store(true, Ordering::Release);
    }

    /// Take every pending message; skips the lock when nothing was posted
    pub(crate) fn drain(&self) -> Vec<Reclaimed> {
        if !self.has_pending.load(Ordering::Acquire) {
            return Vec::new();
        }
        let mut pending = self.pending.lock();
        self.has_pending.store(false, Ordering::Relaxed);
        std::mem::take(&mut *pending)
    }
}

struct Watcher {
    queue: Weak<ReclaimQueue>,
    slot: usize,
    generation: u64,
}

impl Watcher {
    fn is_for(&self, queue: &Arc<ReclaimQueue>, slot: usize, generation: u64) -> bool {
        std::ptr::eq(self.queue.as_ptr(), Arc::as_ptr(queue))
            && self.slot == slot
            && self.generation == generation
    }
}

fn notify(watchers: Vec<Watcher>) {
    for watcher in watchers {
        if let Some(queue) = watcher.queue.upgrade() {
            queue.push(Reclaimed {
                slot: watcher.slot,
                generation: watcher.generation,
            });
        }
    }
}

struct Shared<K> {
    key: K,
    invalidated: AtomicBool,
    watchers: Mutex<Vec<Watcher>>,
}

impl<K> Drop for Shared<K> {
    fn drop(&mut self) {
        if !*self.invalidated.get_mut() {
            notify(std::mem::take(self.watchers.get_mut()));
        }
    }
}

/// Strong, shareable hold on a key stored in weak-mode structures.
///
/// Clones share one key. Once every clone is dropped, or any clone calls
/// [`invalidate`](KeyHandle::invalidate), the key disappears from every weak
/// structure it was added to, no later than that structure's next operation.
pub struct KeyHandle<K> {
    shared: Arc<Shared<K>>,
}

impl<K> KeyHandle<K> {
    /// Wrap `key` in a new handle
    pub fn new(key: K) -> Self {
        Self {
            shared: Arc::new(Shared {
                key,
                invalidated: AtomicBool::new(false),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The key this handle keeps alive
    pub fn key(&self) -> &K {
        &self.shared.key
    }

    /// Withdraw the key from every weak structure holding it, even though
    /// handles still exist. Idempotent.
    pub fn invalidate(&self) {
        if self.shared.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }
        let watchers = std::mem::take(&mut *self.shared.watchers.lock());
        notify(watchers);
    }

    /// Whether [`invalidate`](KeyHandle::invalidate) was called on any clone
    pub fn is_invalidated(&self) -> bool {
        self.shared.invalidated.load(Ordering::Acquire)
    }

    /// Whether two handles share the same key allocation
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.shared, &other.shared)
    }

    pub(crate) fn downgrade(&self, hash: u64) -> WeakKey<K> {
        WeakKey {
            target: Arc::downgrade(&self.shared),
            hash,
        }
    }

    /// Ask to be told through `queue` when this key goes away.
    ///
    /// Returns `false` if the handle is already invalidated; the caller then
    /// posts the message itself.
    pub(crate) fn watch(&self, queue: &Arc<ReclaimQueue>, slot: usize, generation: u64) -> bool {
        let mut watchers = self.shared.watchers.lock();
        if self.shared.invalidated.load(Ordering::Acquire) {
            return false;
        }
        watchers.retain(|watcher| watcher.queue.strong_count() > 0);
        watchers.push(Watcher {
            queue: Arc::downgrade(queue),
            slot,
            generation,
        });
        true
    }

    pub(crate) fn unwatch(&self, queue: &Arc<ReclaimQueue>, slot: usize, generation: u64) {
        self.shared
            .watchers
            .lock()
            .retain(|watcher| !watcher.is_for(queue, slot, generation));
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.shared.watchers.lock().len()
    }
}

impl<K> Clone for KeyHandle<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K> Deref for KeyHandle<K> {
    type Target = K;

    fn deref(&self) -> &K {
        &self.shared.key
    }
}

impl<K: PartialEq> PartialEq for KeyHandle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.shared.key == other.shared.key
    }
}

impl<K: Eq> Eq for KeyHandle<K> {}

impl<K: Hash> Hash for KeyHandle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.key.hash(state);
    }
}

impl<K: fmt::Debug> fmt::Debug for KeyHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("key", &self.shared.key)
            .field("invalidated", &self.is_invalidated())
            .finish()
    }
}

/// Non-owning reference to a [`KeyHandle`]'s key, with its index hash
pub(crate) struct WeakKey<K> {
    target: Weak<Shared<K>>,
    hash: u64,
}

impl<K> WeakKey<K> {
    /// Transient strong hold; `None` once the key is dropped or invalidated
    pub(crate) fn upgrade(&self) -> Option<KeyHandle<K>> {
        let shared = self.target.upgrade()?;
        if shared.invalidated.load(Ordering::Acquire) {
            return None;
        }
        Some(KeyHandle { shared })
    }

    pub(crate) fn hash(&self) -> u64 {
        self.hash
    }
}

impl<K> fmt::Debug for WeakKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKey")
            .field("hash", &self.hash)
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}
