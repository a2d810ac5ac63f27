//! Index statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters shared by every index structure
#[derive(Debug, Default)]
pub struct IndexStats {
    inserts: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    purged: AtomicU64,
    advances: AtomicU64,
}

impl IndexStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_purged(&self, count: u64) {
        self.purged.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_advance(&self) {
        self.advances.fetch_add(1, Ordering::Relaxed);
    }

    /// Entries linked by `put` / `add`
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Entries unlinked by an explicit `remove`
    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    /// Entries unlinked by `evict_lru` or `release_matching`
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Stale weak-mode entries swept after their key was reclaimed
    pub fn purged(&self) -> u64 {
        self.purged.load(Ordering::Relaxed)
    }

    /// Successful clock cursor steps
    pub fn advances(&self) -> u64 {
        self.advances.load(Ordering::Relaxed)
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.inserts.store(0, Ordering::Relaxed);
        self.removals.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.purged.store(0, Ordering::Relaxed);
        self.advances.store(0, Ordering::Relaxed);
    }
}
