use arcindex::{ClockCache, KeyHandle, RecencyTracker, WeakClockCache};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn bench_strong_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("strong_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("clock_get_hit", |b| {
        let cache = ClockCache::with_capacity(1000);
        for i in 0..1000u64 {
            cache.put(i, vec![b'x'; 64]).unwrap();
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(cache.get(&(counter % 1000)));
            counter += 1;
        });
    });

    group.bench_function("recency_contains", |b| {
        let tracker = RecencyTracker::with_capacity(1000);
        for i in 0..1000u64 {
            tracker.add(i).unwrap();
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(tracker.contains(&(counter % 2000)));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_clock_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_sweep");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("strong_next", |b| {
        let cache = ClockCache::with_capacity(1000);
        for i in 0..1000u64 {
            cache.put(i, i).unwrap();
        }
        b.iter(|| black_box(cache.next()));
    });

    group.bench_function("weak_next", |b| {
        let cache = WeakClockCache::with_capacity(1000);
        let handles: Vec<_> = (0..1000u64).map(KeyHandle::new).collect();
        for handle in &handles {
            cache.put(handle.clone(), **handle).unwrap();
        }
        b.iter(|| black_box(cache.next()));
    });

    group.finish();
}

fn bench_recency_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("recency_churn");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("add_refresh_evict", |b| {
        let tracker = RecencyTracker::with_capacity(1000);
        for i in 0..1000u64 {
            tracker.add(i).unwrap();
        }

        let mut counter = 1000u64;
        b.iter(|| {
            // Refresh an existing key, then admit a new one at the cost of the LRU
            tracker.add(counter - 500).unwrap();
            tracker.add(counter).unwrap();
            black_box(tracker.evict_lru());
            counter += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_strong_get,
    bench_clock_sweep,
    bench_recency_churn
);
criterion_main!(benches);
