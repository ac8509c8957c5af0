//! Benchmarks for per-query ranking over a populated graph.

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use memoir_core::types::{ClipId, Embedding};
use memoir_graph::{MemoryGraph, MemoryStatement};
use memoir_retrieval::rank_nodes;

fn pseudo_embedding(seed: u64, dims: usize) -> Embedding {
    // xorshift keeps the fixture deterministic without a rand dependency.
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut values = Vec::with_capacity(dims);
    for _ in 0..dims {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        values.push(((state as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32);
    }
    Embedding::new(values).unwrap_or_else(|_| Embedding(vec![1.0]))
}

fn build_graph(clips: u64) -> MemoryGraph {
    let mut graph = MemoryGraph::new();
    for i in 0..clips {
        graph
            .append_clip(
                ClipId(i),
                vec![MemoryStatement::new(
                    format!("statement for clip {}", i),
                    Some(pseudo_embedding(i, 384)),
                )],
                &BTreeSet::new(),
            )
            .expect("append");
    }
    graph
}

fn bench_rank(c: &mut Criterion) {
    let graph = build_graph(1_000);
    let query = pseudo_embedding(u64::MAX / 2, 384);

    c.bench_function("rank_1k_clips_top5", |b| {
        b.iter(|| {
            black_box(rank_nodes(
                black_box(&graph),
                black_box(&query),
                "benchmark query",
                5,
                0.0,
            ))
        })
    });
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
