//! Benchmarks for keyword routing.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use guardian_cognition::RoutingEngine;

const TASKS: &[&str] = &[
    "optimize the performance of the query",
    "database schema migration for the user table",
    "debug the crash in the sync worker",
    "write the onboarding tutorial",
    "design a new color palette for the dashboard",
    "hello there",
];

fn bench_route(c: &mut Criterion) {
    let router = RoutingEngine::new();
    let mut group = c.benchmark_group("routing");

    group.bench_function("route_mixed", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % TASKS.len();
            router.route(black_box(TASKS[i]))
        });
    });

    let long_task = TASKS.join(" and then ").repeat(8);
    group.bench_function("route_long_text", |b| {
        b.iter(|| router.route(black_box(&long_task)));
    });

    group.finish();
}

criterion_group!(benches, bench_route);
criterion_main!(benches);
