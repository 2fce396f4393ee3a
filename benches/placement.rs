//! Placement benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ringfs::common::FileGroup;
use ringfs::coordinator::diff;
use ringfs::Ring;
use std::collections::BTreeSet;

fn nodes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("10.0.{}.{}", i / 250, i % 250 + 1)).collect()
}

fn bench_get_replicas(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_replicas");
    for size in [5usize, 50, 500] {
        let ring = Ring::with_nodes(160, nodes(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ring, |b, ring| {
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                ring.get_replicas(black_box(&format!("file-{}", i)), 4)
            })
        });
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let ring = Ring::with_nodes(160, nodes(50));
    c.bench_function("add_node_50x160", |b| {
        b.iter(|| ring.add_node(black_box("10.9.9.9")))
    });
}

fn bench_plan(c: &mut Criterion) {
    let old = Ring::with_nodes(160, nodes(20));
    let files: Vec<FileGroup> = (0..10_000)
        .map(|i| {
            let name = format!("file-{}", i);
            let replicas: BTreeSet<String> =
                old.get_replicas(&name, 4).unwrap_or_default().into_iter().collect();
            FileGroup {
                name,
                version: 1,
                replicas,
            }
        })
        .collect();
    let new = old.remove_node("10.0.0.7");

    c.bench_function("plan_10k_files_one_failure", |b| {
        b.iter(|| diff::plan(black_box(&old), black_box(&new), &files, 4))
    });
}

criterion_group!(benches, bench_get_replicas, bench_rebuild, bench_plan);
criterion_main!(benches);
