//! Streaming and simplification throughput on synthetic toroidal grids.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use reeb::prelude::*;

/// `n × n` toroidal triangle grid with a generic scalar per vertex.
fn torus(n: u64) -> (Vec<(u64, u64, u64)>, Vec<f64>) {
    let v = |i: u64, j: u64| (i % n) * n + (j % n);
    let mut triangles = Vec::new();
    for i in 0..n {
        for j in 0..n {
            let (a, b, c, d) = (v(i, j), v(i + 1, j), v(i, j + 1), v(i + 1, j + 1));
            triangles.push((a, b, c));
            triangles.push((b, d, c));
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let scalars = (0..n * n)
        .map(|k| (k as f64).sin() * 10.0 + k as f64 * 1e-3)
        .collect();
    (triangles, scalars)
}

fn stream(triangles: &[(u64, u64, u64)], scalars: &[f64]) -> ReebGraph {
    let mut graph = ReebGraph::new();
    for &(a, b, c) in triangles {
        graph
            .stream_triangle(
                a,
                scalars[a as usize],
                b,
                scalars[b as usize],
                c,
                scalars[c as usize],
            )
            .unwrap();
    }
    graph.close_stream().unwrap();
    graph
}

fn bench_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_torus");
    for n in [8u64, 16, 32] {
        let (triangles, scalars) = torus(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| stream(&triangles, &scalars));
        });
    }
    group.finish();
}

fn bench_simplification(c: &mut Criterion) {
    let (triangles, scalars) = torus(16);
    let closed = stream(&triangles, &scalars);
    c.bench_function("simplify_torus_16", |b| {
        b.iter(|| {
            let mut graph = closed.deep_copy();
            graph.simplify(0.5, None).unwrap()
        });
    });
}

criterion_group!(benches, bench_streaming, bench_simplification);
criterion_main!(benches);
