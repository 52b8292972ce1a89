//! Integration test: feature store to registered model

mod common;

use sunshine_mlops::config::{FeaturePipelineSettings, TrainingSettings};
use sunshine_mlops::error::PipelineError;
use sunshine_mlops::feature_store::LocalFeatureStore;
use sunshine_mlops::pipeline::{FeaturePipeline, TrainingPipeline};
use sunshine_mlops::timeseries::{TimeFeatureAugmenter, TimeWindowFeatures};
use sunshine_mlops::training::{split_features_label, ModelRegistry, ModelStatus};

fn load_features(dir: &std::path::Path, tuning: bool, days: u32) {
    let raw_path = common::write_configs(dir, tuning);
    common::write_raw_extract(&raw_path, days);
    FeaturePipeline::new(FeaturePipelineSettings::load(dir).unwrap())
        .run()
        .unwrap();
}

#[test]
fn test_train_and_register() {
    let dir = tempfile::tempdir().unwrap();
    load_features(dir.path(), false, 60);

    let settings = TrainingSettings::load(dir.path()).unwrap();
    let summary = TrainingPipeline::new(settings).run().unwrap();

    assert_eq!(summary.n_samples, 59);
    assert!(summary.feature_names.contains(&"tavg_rolling_mean".to_string()));
    assert!(!summary.feature_names.contains(&"tsun_label".to_string()));
    assert!(!summary.feature_names.contains(&"date".to_string()));
    assert!(summary.best_params.is_none());
    assert!(summary.metrics.cv_mae.is_none());
    assert_eq!(summary.entry.version, 1);
    assert_eq!(summary.entry.status, ModelStatus::Staging);

    let registry = ModelRegistry::open(dir.path().join("registry")).unwrap();
    let registered = registry.get_latest("sunshine").unwrap();
    assert_eq!(registered.feature_names, summary.feature_names);
    assert_eq!(registered.metrics, summary.metrics);
}

#[test]
fn test_tuned_training_records_search() {
    let dir = tempfile::tempdir().unwrap();
    load_features(dir.path(), true, 60);

    let settings = TrainingSettings::load(dir.path()).unwrap();
    let summary = TrainingPipeline::new(settings).run().unwrap();

    assert!(summary.best_params.is_some());
    let cv_mae = summary.metrics.cv_mae.unwrap();
    assert!(cv_mae.is_finite() && cv_mae >= 0.0);
    assert!(dir
        .path()
        .join("registry")
        .join("sunshine")
        .join("v1_search.json")
        .exists());
}

#[test]
fn test_registered_model_reproduces_predictions() {
    let dir = tempfile::tempdir().unwrap();
    load_features(dir.path(), false, 45);
    let settings = TrainingSettings::load(dir.path()).unwrap();
    TrainingPipeline::new(settings.clone()).run().unwrap();
    let second = TrainingPipeline::new(settings).run().unwrap();
    assert_eq!(second.entry.version, 2);

    let registry = ModelRegistry::open(dir.path().join("registry")).unwrap();
    assert_eq!(registry.list_versions("sunshine"), vec![1, 2]);
    let first = registry.get_version("sunshine", 1).unwrap();
    let latest = registry.get_latest("sunshine").unwrap();

    let store = LocalFeatureStore::open(dir.path().join("store")).unwrap();
    let data = store.read_feature_group("weather", 1).unwrap();
    let data = TimeWindowFeatures::default().augment(&data, "date").unwrap();
    let (x, _) = split_features_label(&data, "tsun_label", &["date"]).unwrap();
    assert_eq!(x.names(), latest.feature_names.as_slice());

    // seeded training gives identical models
    assert_eq!(
        first.model.predict(&x).unwrap(),
        latest.model.predict(&x).unwrap()
    );
}

#[test]
fn test_empty_time_range_is_insufficient() {
    let dir = tempfile::tempdir().unwrap();
    load_features(dir.path(), false, 20);

    let mut settings = TrainingSettings::load(dir.path()).unwrap();
    settings.start_date = chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    settings.end_date = chrono::NaiveDate::from_ymd_opt(2030, 12, 31).unwrap();
    let err = TrainingPipeline::new(settings).run().unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { rows: 0, .. }));
}
