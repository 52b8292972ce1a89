use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use sunshine_mlops::training::{
    score, xgboost_search_space, FeatureMatrix, TimeSeriesTrainer, TrainerConfig, XGBoostConfig,
};

fn create_weather_like_data(n_rows: usize, n_features: usize) -> (FeatureMatrix, Array1<f64>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let values = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 30.0);

    // sunshine minutes loosely driven by the first two features
    let target: Array1<f64> = (0..n_rows)
        .map(|r| 20.0 * values[[r, 0]] - 5.0 * values[[r, 1]] + rng.gen::<f64>() * 10.0)
        .collect();

    let names = (0..n_features).map(|i| format!("feature_{}", i)).collect();
    (FeatureMatrix::new(names, values).unwrap(), target)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    let model = XGBoostConfig {
        n_estimators: 50,
        ..XGBoostConfig::default()
    };
    for n_rows in [365, 1000, 5000].iter() {
        let (x, y) = create_weather_like_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut trainer =
                    TimeSeriesTrainer::new(TrainerConfig::default().with_model(model.clone()));
                trainer.fit(black_box(x), black_box(y), false, 0, 3).unwrap()
            })
        });
    }

    let (x, y) = create_weather_like_data(1000, 10);
    let params = xgboost_search_space().sample(&mut Xoshiro256PlusPlus::seed_from_u64(1));
    group.bench_function("cv_score_3_splits", |b| {
        b.iter(|| score(black_box(&params), &model, x.view(), y.view(), 3).unwrap())
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let (train_x, train_y) = create_weather_like_data(2000, 10);
    let mut trainer = TimeSeriesTrainer::new(TrainerConfig::default());
    trainer.fit(&train_x, &train_y, false, 0, 3).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let (test_x, _) = create_weather_like_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &test_x, |b, x| {
            b.iter(|| trainer.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
