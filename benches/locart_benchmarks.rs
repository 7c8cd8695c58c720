use criterion::{black_box, criterion_group, criterion_main, Criterion};
use locart::config::CalibratorConfig;
use locart::data::Matrix;
use locart::partition::PartitionStrategy;
use locart::predictor::{IntervalPredictor, PointPredictor};
use locart::utils::conformal_quantile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

struct Line;

impl PointPredictor for Line {
    fn predict(&self, data: &Matrix<f64>) -> Vec<f64> {
        (0..data.rows).map(|i| 2.0 * data.get(i, 0) + 0.5 * data.get(i, 1)).collect()
    }
}

fn synthetic(n: usize, rng: &mut StdRng) -> (Vec<f64>, Vec<f64>) {
    let mut flat = Vec::with_capacity(n * 2);
    for _ in 0..2 {
        for _ in 0..n {
            flat.push(rng.gen_range(0.0..10.0));
        }
    }
    let y: Vec<f64> = (0..n)
        .map(|i| 2.0 * flat[i] + 0.5 * flat[n + i] + rng.gen_range(-1.0..1.0))
        .collect();
    (flat, y)
}

pub fn locart_benchmarks(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let (part_flat, y_part) = synthetic(5_000, &mut rng);
    let (cal_flat, y_cal) = synthetic(10_000, &mut rng);
    let (test_flat, _) = synthetic(10_000, &mut rng);

    let scores: Vec<f64> = (0..10_000).map(|_| rng.gen_range(0.0..2.0)).collect();
    c.bench_function("conformal quantile 10k", |b| {
        b.iter(|| conformal_quantile(black_box(&scores), black_box(0.1), false))
    });

    let model = Line;
    for (name, strategy) in [
        (
            "tree",
            PartitionStrategy::Tree {
                max_depth: 4,
                min_samples_leaf: 50,
            },
        ),
        (
            "kmeans",
            PartitionStrategy::KMeans {
                n_clusters: 16,
                max_iter: 100,
                seed: 0,
            },
        ),
    ] {
        let cfg = CalibratorConfig::default().set_strategy(strategy);
        c.bench_function(&format!("fit {}", name), |b| {
            b.iter(|| {
                IntervalPredictor::new(cfg, &model)
                    .fit(
                        &Matrix::new(black_box(&part_flat), 5_000, 2),
                        black_box(&y_part),
                        &Matrix::new(black_box(&cal_flat), 10_000, 2),
                        black_box(&y_cal),
                    )
                    .unwrap()
            })
        });

        let predictor = IntervalPredictor::new(cfg, &model)
            .fit(
                &Matrix::new(&part_flat, 5_000, 2),
                &y_part,
                &Matrix::new(&cal_flat, 10_000, 2),
                &y_cal,
            )
            .unwrap();
        let test = Matrix::new(&test_flat, 10_000, 2);
        c.bench_function(&format!("predict 10k {} serial", name), |b| {
            b.iter(|| predictor.predict_intervals(black_box(&test), false).unwrap())
        });
        c.bench_function(&format!("predict 10k {} parallel", name), |b| {
            b.iter(|| predictor.predict_intervals(black_box(&test), true).unwrap())
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5)).sample_size(20);
    targets = locart_benchmarks
}
criterion_main!(benches);
