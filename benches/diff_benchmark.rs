//! Benchmarks for snapshot diffing.
//!
//! The differ runs once per cycle over every file on every volume, so its
//! cost grows with the catalog. These benchmarks measure it at catalog
//! sizes from 1k to 100k files with roughly 1% churn between snapshots.
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                     # Run all benchmarks
//! cargo bench -- snapshot_diff    # Diff only
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trawler::crawler::{diff, DiffPolicy, Snapshot};
use trawler::storage::FileRecord;

/// Build a snapshot of `count` files, offset so consecutive snapshots overlap.
fn snapshot(count: usize, offset: usize) -> Snapshot {
    (offset..offset + count)
        .map(|i| {
            FileRecord::new(format!("/volume/dir{}/file{i}.txt", i % 100))
                .with_size(i as u64)
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_diff");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    for count in &[1_000usize, 10_000, 100_000] {
        let cache = snapshot(*count, 0);
        let next = snapshot(*count, count / 100);

        group.bench_with_input(BenchmarkId::new("presence_only", count), count, |b, _| {
            b.iter(|| diff(black_box(&next), black_box(&cache), DiffPolicy::PresenceOnly));
        });
        group.bench_with_input(BenchmarkId::new("detect_modified", count), count, |b, _| {
            b.iter(|| diff(black_box(&next), black_box(&cache), DiffPolicy::DetectModified));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff);
criterion_main!(benches);
