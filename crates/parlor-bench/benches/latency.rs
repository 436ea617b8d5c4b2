//! Latency benchmarks for Parlor.
//!
//! These benchmarks measure the time from a peer sending a message to
//! every peer in the room having received it, through the full client
//! pumps over the in-memory transport.

use criterion::{criterion_group, criterion_main, Criterion};
use parlor_core::{Client, Profile};
use parlor_transport::memory::{duplex, MemoryPeer};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

async fn connect_peers(count: usize) -> Vec<MemoryPeer> {
    let hub = parlor_bench::room(0, 256).await;

    let mut peers = Vec::with_capacity(count);
    for i in 0..count {
        let (source, sink, peer) = duplex(256);
        let client = Client::new(hub.clone(), Profile::new(format!("peer-{}", i), ""));
        tokio::spawn(client.run(source, sink));
        peers.push(peer);
    }

    while hub.stats().await.unwrap().members < count {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    peers
}

/// Benchmark send-to-everyone-received latency.
fn bench_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("roundtrip");

    for count in [2, 10] {
        group.bench_function(format!("{}_peers", count), |b| {
            let mut peers = rt.block_on(connect_peers(count));

            b.iter_custom(|iters| {
                rt.block_on(async {
                    let start = Instant::now();
                    for _ in 0..iters {
                        peers[0].send("ping").await.unwrap();
                        for peer in peers.iter_mut() {
                            peer.recv().await.unwrap();
                        }
                    }
                    start.elapsed()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
