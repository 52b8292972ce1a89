//! Integration test: time-series trainer

use ndarray::{Array1, Array2};
use sunshine_mlops::error::PipelineError;
use sunshine_mlops::optimizer::SamplerType;
use sunshine_mlops::timeseries::ExpandingWindowSplit;
use sunshine_mlops::training::{FeatureMatrix, TimeSeriesTrainer, TrainerConfig, XGBoostConfig};

fn weather_matrix(n: usize) -> (FeatureMatrix, Array1<f64>) {
    // tavg, prcp, pres with a seasonal shape
    let values = Array2::from_shape_fn((n, 3), |(r, c)| {
        let t = r as f64;
        match c {
            0 => 10.0 + 8.0 * (t / 6.0).sin(),
            1 => ((r * 7) % 5) as f64,
            _ => 1010.0 + ((r * 3) % 11) as f64,
        }
    });
    let y = values
        .rows()
        .into_iter()
        .map(|row| 30.0 * row[0] - 40.0 * row[1] + 200.0)
        .collect();
    let names = vec!["tavg".to_string(), "prcp".to_string(), "pres".to_string()];
    (FeatureMatrix::new(names, values).unwrap(), y)
}

fn small_trainer(seed: u64) -> TimeSeriesTrainer {
    TimeSeriesTrainer::new(
        TrainerConfig::default()
            .with_model(XGBoostConfig {
                n_estimators: 20,
                max_depth: 3,
                ..Default::default()
            })
            .with_random_state(Some(seed)),
    )
}

#[test]
fn test_forty_rows_three_splits_scenario() {
    let folds = ExpandingWindowSplit::new(3).split(40).unwrap();
    let train: Vec<usize> = folds.iter().map(|f| f.train.len()).collect();
    let validation: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
    assert_eq!(train, vec![10, 20, 30]);
    assert_eq!(validation, vec![10, 10, 10]);

    let (x, y) = weather_matrix(40);
    let mut trainer = small_trainer(42);
    trainer.fit(&x, &y, true, 4, 3).unwrap();

    let search = trainer.search_result().unwrap();
    assert_eq!(search.trials.len(), 4);
    let min = search
        .trials
        .iter()
        .map(|t| t.value)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(search.best_score, min);
    assert_eq!(trainer.predict(&x).unwrap().len(), 40);
}

#[test]
fn test_untuned_fit_predicts_every_row_in_order() {
    let (x, y) = weather_matrix(30);
    let mut trainer = small_trainer(1);
    trainer.fit(&x, &y, false, 0, 3).unwrap();

    let preds = trainer.predict(&x).unwrap();
    assert_eq!(preds.len(), 30);
    // single rows predict the same as in the batch
    for row in [0, 13, 29] {
        let one = FeatureMatrix::new(
            x.names().to_vec(),
            x.values().slice(ndarray::s![row..row + 1, ..]).to_owned(),
        )
        .unwrap();
        assert_eq!(trainer.predict(&one).unwrap()[0], preds[row]);
    }
}

#[test]
fn test_seeded_search_is_reproducible() {
    let (x, y) = weather_matrix(40);
    let run = |seed| {
        let mut trainer = small_trainer(seed);
        trainer.fit(&x, &y, true, 6, 3).unwrap();
        let search = trainer.search_result().unwrap().clone();
        (search.best_params, trainer.predict(&x).unwrap())
    };

    let (params_a, preds_a) = run(7);
    let (params_b, preds_b) = run(7);
    assert_eq!(params_a, params_b);
    assert_eq!(preds_a, preds_b);
}

#[test]
fn test_random_sampler_search() {
    let (x, y) = weather_matrix(40);
    let mut trainer = TimeSeriesTrainer::new(
        TrainerConfig::default()
            .with_sampler(SamplerType::Random)
            .with_random_state(Some(3)),
    );
    trainer.fit(&x, &y, true, 3, 2).unwrap();
    let search = trainer.search_result().unwrap();
    assert!(search.trials.iter().all(|t| t.value.is_finite()));
    let best = &search.trials[search.best_trial];
    assert_eq!(best.params, search.best_params);
}

#[test]
fn test_equal_scores_keep_earliest_trial() {
    // a constant label is fitted exactly by every configuration
    let (x, _) = weather_matrix(40);
    let y = Array1::from_elem(40, 120.0);
    let mut trainer = small_trainer(11);
    trainer.fit(&x, &y, true, 5, 3).unwrap();

    let search = trainer.search_result().unwrap();
    assert!(search.trials.iter().all(|t| t.value == 0.0));
    assert_eq!(search.best_trial, 0);
    assert_eq!(search.best_params, search.trials[0].params);
}

#[test]
fn test_predict_before_fit() {
    let (x, _) = weather_matrix(10);
    let trainer = small_trainer(0);
    assert!(matches!(trainer.predict(&x), Err(PipelineError::ModelNotFitted)));
    assert!(trainer.get_model().is_none());
}

#[test]
fn test_reordered_columns_are_rejected() {
    let (x, y) = weather_matrix(30);
    let mut trainer = small_trainer(0);
    trainer.fit(&x, &y, false, 0, 3).unwrap();

    let mut names = x.names().to_vec();
    names.swap(0, 1);
    let swapped = FeatureMatrix::new(names, x.values().clone()).unwrap();
    assert!(matches!(
        trainer.predict(&swapped),
        Err(PipelineError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_too_few_rows_for_splits() {
    let (x, y) = weather_matrix(3);
    let mut trainer = small_trainer(0);
    let err = trainer.fit(&x, &y, true, 2, 3).unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { rows: 3, required: 4 }));
    assert!(trainer.get_model().is_none());
}
