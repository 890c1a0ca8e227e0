//! Prediction throughput benchmarks: single row vs blocked batch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use grove::model::{Combine, Model, ModelMeta};
use grove::repr::{CategorySets, Forest, ObliviousTree, SplitCond};
use grove::{CatBatch, CatValues, Parallelism, Predictor};
use ndarray::Array2;

const N_FEATURES: usize = 32;
const N_TREES: usize = 100;
const DEPTH: usize = 6;

/// Deterministic pseudo-random stream; benches must not depend on `rand`.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn next_f32(&mut self) -> f32 {
        (self.next_u32() % 1000) as f32 / 1000.0
    }
}

fn build_model() -> Model {
    let mut rng = Lcg(42);
    let mut forest = Forest::for_regression();
    for _ in 0..N_TREES {
        let splits = (0..DEPTH)
            .map(|_| SplitCond::Numeric {
                feature: rng.next_u32() % N_FEATURES as u32,
                threshold: rng.next_f32(),
            })
            .collect();
        let leaves = (0..1 << DEPTH).map(|_| f64::from(rng.next_f32())).collect();
        forest.push_tree(ObliviousTree::new(splits, leaves, CategorySets::empty()));
    }
    Model::new(
        forest,
        vec![],
        ModelMeta {
            n_numeric_features: N_FEATURES,
            n_categorical_features: 0,
            prediction_dimension: 1,
            combine: Combine::Sum,
        },
    )
    .expect("valid bench model")
}

fn build_rows(n_rows: usize) -> Array2<f32> {
    let mut rng = Lcg(7);
    Array2::from_shape_fn((n_rows, N_FEATURES), |_| rng.next_f32())
}

fn bench_predict(c: &mut Criterion) {
    let model = build_model();
    let predictor = Predictor::new(&model);
    let row: Vec<f32> = build_rows(1).row(0).to_vec();
    let batch = build_rows(512);

    c.bench_function("predict_row", |b| {
        b.iter(|| {
            predictor
                .predict_row(Some(black_box(&row)), CatValues::Absent)
                .unwrap()
        })
    });

    c.bench_function("predict_batch_512_sequential", |b| {
        b.iter(|| {
            predictor
                .predict_batch(
                    Some(black_box(batch.view())),
                    CatBatch::Absent,
                    Parallelism::Sequential,
                )
                .unwrap()
        })
    });

    c.bench_function("predict_batch_512_parallel", |b| {
        b.iter(|| {
            predictor
                .predict_batch(
                    Some(black_box(batch.view())),
                    CatBatch::Absent,
                    Parallelism::Parallel,
                )
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
