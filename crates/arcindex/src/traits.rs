//! Common interface over the strong and weak backends.
//!
//! | Trait               | Strong backend        | Weak backend              |
//! |---------------------|-----------------------|---------------------------|
//! | [`ClockIndex`]      | [`ClockCache`]        | [`WeakClockCache`]        |
//! | [`RecencyIndex`]    | [`RecencyTracker`]    | [`WeakRecencyTracker`]    |
//!
//! `Key` is what callers hand in and get back: the key itself for strong
//! backends, a [`KeyHandle`](crate::KeyHandle) for weak ones. Lookups always
//! take `&K`.
//!
//! [`ClockCache`]: crate::ClockCache
//! [`WeakClockCache`]: crate::WeakClockCache
//! [`RecencyTracker`]: crate::RecencyTracker
//! [`WeakRecencyTracker`]: crate::WeakRecencyTracker

use crate::error::Result;

/// Key→value map swept round-robin by a rotating cursor
pub trait ClockIndex<K, V> {
    /// Owned key type accepted by `put` and returned by `next`
    type Key;

    /// Link a new entry immediately before the cursor.
    ///
    /// A key that already has a live entry gets a second, distinct entry.
    fn put(&self, key: Self::Key, value: V) -> Result<()>;

    /// Value of the newest entry for `key`
    fn get(&self, key: &K) -> Option<V>;

    /// Unlink the newest entry for `key` and return its value
    fn remove(&self, key: &K) -> Option<V>;

    /// Unlink every entry whose key satisfies `predicate`, in list order
    fn release_matching<F>(&self, predicate: F)
    where
        F: FnMut(&K) -> bool;

    /// Number of live entries
    fn size(&self) -> usize;

    /// Return the entry under the cursor and advance the cursor past it
    fn next(&self) -> Option<(Self::Key, V)>;

    /// Unlink every entry
    fn clear(&self);
}

/// Key set ordered from most- to least-recently added
pub trait RecencyIndex<K> {
    /// Owned key type accepted by `add` and returned by `evict_lru`
    type Key;

    /// Link `key` at the MRU end, or move its existing node there
    fn add(&self, key: Self::Key) -> Result<()>;

    /// Membership check; never reorders
    fn contains(&self, key: &K) -> bool;

    /// Unlink `key`; returns whether it was present
    fn remove(&self, key: &K) -> bool;

    /// Unlink and return the least-recently added live key
    fn evict_lru(&self) -> Option<Self::Key>;

    /// Unlink every key satisfying `predicate`, in MRU-to-LRU order
    fn release_matching<F>(&self, predicate: F)
    where
        F: FnMut(&K) -> bool;

    /// Number of live keys
    fn size(&self) -> usize;

    /// Unlink every key
    fn clear(&self);
}
