use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use grid_forensics::analysis::{confidence::ConfidenceAggregator, scores::SymmetryScores};
use ndarray::Array4;

fn bench_aggregation(c: &mut Criterion) {
    // 4096x3072 image at block size 32
    let probabilities = Array4::from_shape_fn((4, 4, 96, 128), |(g, k, r, c)| {
        ((g * 31 + k * 17 + r * 7 + c) % 97) as f64 / 97.0
    });
    let scores = SymmetryScores::from_probabilities(probabilities).unwrap();
    let aggregator = ConfidenceAggregator::new();

    c.bench_function("aggregate_symmetries 96x128", |b| {
        b.iter(|| aggregator.aggregate_symmetries(black_box(&scores)).unwrap())
    });
}

criterion_group!(benches, bench_aggregation);
criterion_main!(benches);
