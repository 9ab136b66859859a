//! Benchmarks for vector and hybrid search.
//!
//! The vector index is exhaustive, so cost grows linearly with the number of
//! indexed records. Hybrid search adds a relational lookup and a filter check
//! per ranked candidate.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use guardian_cognition::config::VectorSettings;
use guardian_cognition::{HybridBackend, HybridQuery, MemoryBackend, MemoryFilter, MemoryRecord};

const DIMENSIONS: usize = 64;

const AGENTS: &[&str] = &["guardian:lyria", "guardian:draconia", "guardian:alera"];

/// Deterministic pseudo-embedding so runs are comparable.
fn embedding(seed: usize) -> Vec<f32> {
    (0..DIMENSIONS)
        .map(|d| {
            let x = (seed * 31 + d * 17) % 97;
            x as f32 / 97.0 - 0.5
        })
        .collect()
}

fn populate(count: usize) -> HybridBackend {
    let backend = HybridBackend::new(VectorSettings {
        dimensions: DIMENSIONS,
        ..VectorSettings::default()
    });
    for i in 0..count {
        let record = MemoryRecord::new(
            format!("mem-{i}"),
            AGENTS[i % AGENTS.len()],
            "note",
            format!("benchmark memory {i}"),
        )
        .with_timestamp(i as u64)
        .with_embedding(embedding(i));
        backend.store(record).expect("store should succeed");
    }
    backend
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.measurement_time(Duration::from_secs(10));

    for count in [1_000, 10_000] {
        let backend = populate(count);
        let query = embedding(count / 2);

        group.bench_with_input(BenchmarkId::new("vector_search", count), &count, |b, _| {
            b.iter(|| {
                backend
                    .vector_search(black_box(&query), 10)
                    .expect("search should succeed")
            });
        });

        group.bench_with_input(BenchmarkId::new("hybrid_search", count), &count, |b, _| {
            let hybrid = HybridQuery::new(MemoryFilter::new().with_agent("guardian:alera"))
                .with_embedding(query.clone())
                .with_k(10);
            b.iter(|| {
                backend
                    .hybrid_search(black_box(&hybrid))
                    .expect("search should succeed")
            });
        });

        group.bench_with_input(BenchmarkId::new("relational_query", count), &count, |b, _| {
            let filter = MemoryFilter::new()
                .with_agent("guardian:lyria")
                .with_limit(10);
            b.iter(|| {
                backend
                    .query(black_box(&filter))
                    .expect("query should succeed")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
