//! # RefKeeper Repair Benchmarks
//!
//! Throughput of the pure repair state machine and the context store:
//!
//! | Area | Operation | Expectation |
//! |------|-----------|-------------|
//! | Store | `register` with dedup | O(1) per context |
//! | Coordinator | join an in-flight repair | O(1) per caller |
//! | Coordinator | fallback chain over n contexts | O(n) |
//! | Merge | fold n live repairs into one file | O(n) |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::time::Duration;
use tokio::sync::oneshot;

use refkeeper_engine::{
    FileId, RepairCoordinator, ResolverError, UsageContextId, UsageContextStore, UserId,
};

// ============================================================================
// Usage-context store
// ============================================================================

fn bench_store_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("usage-context-store");
    group.measurement_time(Duration::from_secs(5));

    for size in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("register_keyed", size), &size, |b, &size| {
            let mut rng = rand::thread_rng();
            let upper = (size as i64 / 2).max(1);
            let keys: Vec<i64> = (0..size).map(|_| rng.gen_range(0..upper)).collect();
            b.iter(|| {
                let store = UsageContextStore::new();
                for key in &keys {
                    black_box(store.create_user_photo_source(UserId(*key), *key));
                }
                black_box(store.len())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Repair coordinator
// ============================================================================

fn bench_repair_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair-coordinator");

    for callers in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(callers));
        group.bench_with_input(
            BenchmarkId::new("join_in_flight", callers),
            &callers,
            |b, &callers| {
                b.iter(|| {
                    let mut coord = RepairCoordinator::new(0);
                    coord.add_usage_context(FileId(1), UsageContextId::new(1));
                    let mut receivers = Vec::with_capacity(callers as usize);
                    let mut dispatches = Vec::new();
                    for _ in 0..callers {
                        let (tx, rx) = oneshot::channel();
                        dispatches.extend(coord.repair(FileId(1), tx, 0));
                        receivers.push(rx);
                    }
                    let dispatch = dispatches[0];
                    coord.on_query_result(dispatch.destination, dispatch.context_id, Ok(()), 0);
                    black_box(receivers)
                })
            },
        );
    }

    for contexts in [4u32, 32, 256] {
        group.throughput(Throughput::Elements(contexts as u64));
        group.bench_with_input(
            BenchmarkId::new("fallback_chain", contexts),
            &contexts,
            |b, &contexts| {
                b.iter(|| {
                    let mut coord = RepairCoordinator::new(0);
                    for raw in 1..=contexts {
                        coord.add_usage_context(FileId(1), UsageContextId::new(raw));
                    }
                    let (tx, rx) = oneshot::channel();
                    let mut pending = coord.repair(FileId(1), tx, 0);
                    while let Some(dispatch) = pending.pop() {
                        let failure = Err(ResolverError::Other("miss".to_string()));
                        let (_, next) = coord.on_query_result(
                            dispatch.destination,
                            dispatch.context_id,
                            failure,
                            0,
                        );
                        pending.extend(next);
                    }
                    black_box(rx)
                })
            },
        );
    }

    group.finish();
}

fn bench_merge_live_repairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for files in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(files));
        group.bench_with_input(
            BenchmarkId::new("fold_live_repairs", files),
            &files,
            |b, &files| {
                b.iter(|| {
                    let mut coord = RepairCoordinator::new(0);
                    let target = FileId(0);
                    let mut dispatches = Vec::new();
                    let mut receivers = Vec::new();
                    for raw in 1..=files {
                        let file_id = FileId(raw);
                        coord.add_usage_context(file_id, UsageContextId::new(raw as u32));
                        let (tx, rx) = oneshot::channel();
                        dispatches.extend(coord.repair(file_id, tx, 0));
                        receivers.push(rx);
                        coord.merge(target, file_id, 0);
                    }
                    for dispatch in dispatches {
                        let (destination, context_id) = (dispatch.destination, dispatch.context_id);
                        coord.on_query_result(destination, context_id, Ok(()), 0);
                    }
                    black_box(receivers)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_store_register,
    bench_repair_dedup,
    bench_merge_live_repairs
);
criterion_main!(benches);
