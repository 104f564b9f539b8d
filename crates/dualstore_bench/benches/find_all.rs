//! Store query benchmarks over the in-memory backends.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dualstore_bench::{filter_tree, generate_tags, paged_params, populated_tags};
use dualstore_core::{Indexer, Params, Reader, Writer};
use dualstore_testkit::TestDatabase;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

/// Benchmark filtered, sorted, paged reads on both paths.
fn bench_find_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_all");
    let params = paged_params(filter_tree(4));

    for size in SIZES {
        let db = populated_tags(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("relational", size), &params, |b, params| {
            let store = db.tag_records();
            b.iter(|| black_box(store.find_all(black_box(params)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("index", size), &params, |b, params| {
            let store = db.tags();
            b.iter(|| black_box(store.find_all(black_box(params)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark counting without loading entities.
fn bench_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("count");
    let db = populated_tags(10_000);
    let params = Params::new().filter(filter_tree(2));

    group.bench_function("relational", |b| {
        let store = db.tag_records();
        b.iter(|| black_box(store.count(&params).unwrap()));
    });
    group.bench_function("index", |b| {
        let store = db.tags();
        b.iter(|| black_box(store.count(&params).unwrap()));
    });
    group.finish();
}

/// Benchmark saving a batch through the indexed store.
fn bench_save_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_batch");

    for size in [10usize, 100, 1_000] {
        let tags = generate_tags(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tags, |b, tags| {
            b.iter(|| {
                let db = TestDatabase::new();
                black_box(db.tags().save_all(tags).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark a full rebuild of the tag index.
fn bench_reindex(c: &mut Criterion) {
    let mut group = c.benchmark_group("reindex");
    group.sample_size(10);

    for size in [1_000usize, 10_000] {
        let db = populated_tags(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            let store = db.tags();
            b.iter(|| black_box(store.reindex().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_find_all,
    bench_count,
    bench_save_batch,
    bench_reindex,
);

criterion_main!(benches);
