//! Read-path benchmarks for the decorator stacks.
//!
//! Measures repeated wildcard queries against the bare engine, the pattern
//! result cache and the full snapshot cache, and bulk loading with and
//! without the write buffer.

use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use triplestack::{
    BudgetProbe, CacheConfig, FullSnapshotCache, MemoryBackend, PatternResultCache,
    SharedBackend, Statement, StatementBackend, StatementPattern, WriteBuffer,
};

const SEED: u64 = 0x7A1E;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

fn bench_scales() -> &'static [usize] {
    &[1_000, 10_000, 50_000]
}

fn dataset(size: usize) -> Vec<Statement> {
    let mut rng = StdRng::seed_from_u64(SEED);
    (0..size)
        .map(|i| {
            let predicate = format!("ex:p{}", rng.gen_range(0..16));
            let object = format!("ex:o{}", rng.gen_range(0..size / 10 + 1));
            Statement::new(format!("ex:s{i}"), predicate, object)
        })
        .collect()
}

fn stacks(statements: &[Statement]) -> Vec<(&'static str, SharedBackend)> {
    let cfg = CacheConfig::default();
    let bare: SharedBackend = Arc::new(MemoryBackend::with_statements(statements.to_vec()));
    let pattern_cache: SharedBackend = Arc::new(PatternResultCache::new(
        MemoryBackend::with_statements(statements.to_vec()),
        &cfg,
    ));
    let snapshot_cache: SharedBackend = Arc::new(FullSnapshotCache::new(
        MemoryBackend::with_statements(statements.to_vec()),
        &cfg,
        Arc::new(BudgetProbe::from_config(&cfg)),
    ));
    vec![
        ("bare", bare),
        ("pattern_cache", pattern_cache),
        ("snapshot_cache", snapshot_cache),
    ]
}

fn repeated_queries(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("repeated_queries");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);

    let patterns: Vec<StatementPattern> = (0..16)
        .map(|p| StatementPattern::any().predicate(format!("ex:p{p}")))
        .collect();

    for &size in bench_scales() {
        let statements = dataset(size);
        for (name, stack) in stacks(&statements) {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut total = 0;
                    for pattern in &patterns {
                        total += stack
                            .query(pattern)
                            .expect("query")
                            .count_statements()
                            .expect("count");
                    }
                    total
                });
            });
        }
    }
    group.finish();
}

fn bulk_load(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("bulk_load");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);

    for &size in bench_scales() {
        let statements = dataset(size);
        group.bench_with_input(BenchmarkId::new("direct", size), &size, |b, _| {
            b.iter(|| {
                let backend = MemoryBackend::new();
                for statement in &statements {
                    backend.add(statement).expect("add");
                }
                backend.len()
            });
        });
        group.bench_with_input(BenchmarkId::new("write_buffer", size), &size, |b, _| {
            b.iter(|| {
                let buffer = WriteBuffer::new(MemoryBackend::new());
                for statement in &statements {
                    buffer.add(statement).expect("add");
                }
                buffer.flush().expect("flush");
                buffer.backend().len()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, repeated_queries, bulk_load);
criterion_main!(benches);
