//! # arcindex
//!
//! Ordered index primitives for building adaptive cache-replacement policies.
//!
//! ## Architecture
//! - **ClockCache**: key→value map on a ring swept by a rotating cursor
//! - **RecencyTracker**: key set ordered from most- to least-recently added
//! - **Node list**: slab-backed doubly linked list under both structures
//! - **HashMap / DashMap**: AHash-keyed index for O(1) lookups
//!
//! Each structure comes in two modes behind one trait:
//! - *strong* ([`ClockCache`], [`RecencyTracker`]): keys stay until removed;
//!   lookups never touch the ordering lock.
//! - *weak* ([`WeakClockCache`], [`WeakRecencyTracker`]): keys are held
//!   through caller-owned [`KeyHandle`]s; an entry disappears once its last
//!   handle is dropped or invalidated, swept lazily at the next operation.
//!
//! Capacity limits and eviction policy belong to the caller.

#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod node;
mod reclaim;
mod recency;
mod stats;
mod sweep;
mod traits;

pub use clock::{ClockCache, WeakClockCache};
pub use config::IndexConfig;
pub use error::{Error, Result};
pub use reclaim::KeyHandle;
pub use recency::{RecencyTracker, WeakRecencyTracker};
pub use stats::IndexStats;
pub use traits::{ClockIndex, RecencyIndex};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn structures_are_thread_safe() {
        assert_send_sync::<ClockCache<String, Vec<u8>>>();
        assert_send_sync::<WeakClockCache<String, Vec<u8>>>();
        assert_send_sync::<RecencyTracker<u64>>();
        assert_send_sync::<WeakRecencyTracker<u64>>();
        assert_send_sync::<KeyHandle<String>>();
    }

    fn drive_clock<C: ClockIndex<u32, &'static str>>(cache: &C, key: impl Fn(u32) -> C::Key) {
        cache.put(key(1), "a").unwrap();
        cache.put(key(2), "b").unwrap();
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get(&2), Some("b"));
        assert!(cache.next().is_some());
        cache.release_matching(|k| *k == 1);
        assert_eq!(cache.get(&1), None);
        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn both_clock_backends_share_one_interface() {
        drive_clock(&ClockCache::new(), |k| k);

        let handles: Vec<_> = (0..3).map(KeyHandle::new).collect();
        drive_clock(&WeakClockCache::new(), |k| handles[k as usize].clone());
    }

    fn drive_recency<R: RecencyIndex<u32>>(tracker: &R, key: impl Fn(u32) -> R::Key) {
        tracker.add(key(1)).unwrap();
        tracker.add(key(2)).unwrap();
        tracker.add(key(1)).unwrap();
        assert!(tracker.evict_lru().is_some());
        assert!(!tracker.contains(&2));
        assert!(tracker.remove(&1));
        assert_eq!(tracker.size(), 0);
    }

    #[test]
    fn both_recency_backends_share_one_interface() {
        drive_recency(&RecencyTracker::new(), |k| k);

        let handles: Vec<_> = (0..3).map(KeyHandle::new).collect();
        drive_recency(&WeakRecencyTracker::new(), |k| handles[k as usize].clone());
    }
}
