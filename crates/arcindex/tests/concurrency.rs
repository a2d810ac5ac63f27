// ==============================================
// CONCURRENCY TESTS (integration)
// ==============================================
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use arcindex::{ClockCache, KeyHandle, RecencyTracker, WeakClockCache, WeakRecencyTracker};

#[test]
fn test_clock_concurrent_puts_and_reads() {
    let cache: Arc<ClockCache<String, usize>> = Arc::new(ClockCache::new());
    let num_threads = 8;
    let per_thread = 200;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..per_thread {
                    let key = format!("thread_{}_{}", thread_id, i);
                    cache.put(key.clone(), i).unwrap();
                    assert_eq!(cache.get(&key), Some(i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.size(), num_threads * per_thread);

    // One full revolution visits every entry exactly once
    let mut seen = std::collections::HashSet::new();
    for _ in 0..cache.size() {
        let (key, _) = cache.next().unwrap();
        assert!(seen.insert(key));
    }
    assert_eq!(seen.len(), num_threads * per_thread);
}

#[test]
fn test_clock_concurrent_sweep_and_remove() {
    let cache: Arc<ClockCache<u32, u32>> = Arc::new(ClockCache::new());
    for i in 0..1000 {
        cache.put(i, i).unwrap();
    }

    let removed = Arc::new(AtomicUsize::new(0));
    let sweeper = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for _ in 0..5000 {
                if let Some((key, value)) = cache.next() {
                    assert_eq!(key, value);
                }
            }
        })
    };
    let removers: Vec<_> = (0..4u32)
        .map(|part| {
            let cache = Arc::clone(&cache);
            let removed = Arc::clone(&removed);
            thread::spawn(move || {
                for i in (part..1000).step_by(4) {
                    if i % 3 == 0 && cache.remove(&i).is_some() {
                        removed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    sweeper.join().unwrap();
    for handle in removers {
        handle.join().unwrap();
    }

    let removed = removed.load(Ordering::SeqCst);
    assert_eq!(removed, (0..1000).filter(|i| i % 3 == 0).count());
    assert_eq!(cache.size(), 1000 - removed);
}

#[test]
fn test_recency_concurrent_add_and_evict() {
    let tracker: Arc<RecencyTracker<u64>> = Arc::new(RecencyTracker::new());
    let evicted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..6u64)
        .map(|thread_id| {
            let tracker = Arc::clone(&tracker);
            let evicted = Arc::clone(&evicted);
            thread::spawn(move || {
                for i in 0..500u64 {
                    tracker.add(thread_id * 1000 + i).unwrap();
                    if i % 5 == 0 && tracker.evict_lru().is_some() {
                        evicted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let evicted = evicted.load(Ordering::SeqCst);
    assert_eq!(tracker.size(), 6 * 500 - evicted);
    assert_eq!(tracker.keys().len(), tracker.size());
}

#[test]
fn test_weak_structures_with_keys_dropped_on_other_threads() {
    let cache: Arc<WeakClockCache<u32, u32>> = Arc::new(WeakClockCache::new());
    let tracker: Arc<WeakRecencyTracker<u32>> = Arc::new(WeakRecencyTracker::new());

    let keepers: Vec<_> = (0..4u32)
        .map(|thread_id| {
            let cache = Arc::clone(&cache);
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..250u32 {
                    let key = KeyHandle::new(thread_id * 1000 + i);
                    cache.put(key.clone(), i).unwrap();
                    tracker.add(key.clone()).unwrap();
                    // Odd keys go out of scope here
                    if i % 2 == 0 {
                        kept.push(key);
                    }
                    cache.next();
                }
                kept
            })
        })
        .collect();

    let kept: Vec<KeyHandle<u32>> = keepers
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(cache.size(), kept.len());
    assert_eq!(tracker.size(), kept.len());
    for key in &kept {
        assert!(cache.get(key.key()).is_some());
        assert!(tracker.contains(key.key()));
    }

    drop(kept);
    assert_eq!(cache.size(), 0);
    assert_eq!(tracker.evict_lru(), None);
}
