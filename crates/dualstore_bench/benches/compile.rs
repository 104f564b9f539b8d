//! Query compilation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dualstore_bench::{filter_tree, paged_params};
use dualstore_core::query::{compile_search, compile_select};
use dualstore_core::{Filter, Order, Params, StoreConfig};
use dualstore_testkit::{Package, Tag};

/// Benchmark both dialects over growing filter trees.
fn bench_filter_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_depth");
    let fields = Tag::fields();
    let config = StoreConfig::default();

    for depth in [1usize, 4, 8, 12] {
        let params = paged_params(filter_tree(depth));
        group.bench_with_input(BenchmarkId::new("relational", depth), &params, |b, params| {
            b.iter(|| {
                let select = compile_select("tag", &fields, black_box(params), &[], &config).unwrap();
                black_box(select);
            });
        });
        group.bench_with_input(BenchmarkId::new("index", depth), &params, |b, params| {
            b.iter(|| {
                let request =
                    compile_search("tag", "tag", &fields, black_box(params), &[], &config).unwrap();
                black_box(request);
            });
        });
    }
    group.finish();
}

/// Benchmark rendering compiled queries to text.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let fields = Tag::fields();
    let config = StoreConfig::default();
    let params = paged_params(filter_tree(8));
    let select = compile_select("tag", &fields, &params, &[], &config).unwrap();
    let request = compile_search("tag", "tag", &fields, &params, &[], &config).unwrap();

    group.bench_function("sql", |b| {
        b.iter(|| black_box(select.to_sql()));
    });
    group.bench_function("solr", |b| {
        b.iter(|| black_box(request.to_string()));
    });
    group.finish();
}

/// Benchmark nested filters with the implicit soft-delete filter.
fn bench_nested(c: &mut Criterion) {
    let fields = Package::fields();
    let config = StoreConfig::default();
    let params = Params::new()
        .filter(Filter::nested(
            "tasks",
            vec![Filter::eq("state", "done"), Filter::contains("label", "review")],
        ))
        .sort_by("title", Order::Asc)
        .page(0, 50);
    let implicit = [Filter::is_null("deleted")];

    c.bench_function("compile_nested", |b| {
        b.iter(|| {
            let select =
                compile_select("package", &fields, black_box(&params), &implicit, &config).unwrap();
            let request =
                compile_search("package", "package", &fields, black_box(&params), &implicit, &config)
                    .unwrap();
            black_box((select, request));
        });
    });
}

criterion_group!(benches, bench_filter_depth, bench_render, bench_nested);

criterion_main!(benches);
