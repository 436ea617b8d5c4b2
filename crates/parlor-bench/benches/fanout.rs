//! Throughput benchmarks for the room hub.
//!
//! These benchmarks measure how fast the hub's loop applies publishes and
//! membership changes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parlor_core::{ClientId, Message};
use tokio::runtime::Runtime;

/// Benchmark fan-out to rooms of increasing size.
fn bench_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("fanout");

    for size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let hub = rt.block_on(parlor_bench::room(size, 1 << 16));
            let body = "x".repeat(64);

            b.to_async(&rt).iter(|| {
                let hub = hub.clone();
                let message = Message::new("bench", body.clone());
                async move { hub.publish(black_box(message)).await.unwrap() }
            });
        });
    }

    group.finish();
}

/// Benchmark a join followed by a leave.
fn bench_membership(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let hub = rt.block_on(parlor_bench::room(100, 256));

    c.bench_function("join_leave", |b| {
        b.to_async(&rt).iter(|| {
            let hub = hub.clone();
            async move {
                let id = ClientId::next();
                let (outbox, _rx) = hub.outbox();
                hub.register(id, "bench", outbox).await.unwrap();
                hub.unregister(black_box(id)).await
            }
        });
    });
}

criterion_group!(benches, bench_fanout, bench_membership);
criterion_main!(benches);
