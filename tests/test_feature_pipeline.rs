//! Integration test: feature pipeline from a cached extract to a feature view

mod common;

use polars::prelude::*;
use sunshine_mlops::config::FeaturePipelineSettings;
use sunshine_mlops::feature_store::{FeatureSource, LocalFeatureStore, TimeRange};
use sunshine_mlops::pipeline::FeaturePipeline;
use sunshine_mlops::utils::frame::{column_days, column_f64};
use sunshine_mlops::utils::parse_date;

#[test]
fn test_feature_pipeline_loads_cached_extract() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = common::write_configs(dir.path(), false);
    common::write_raw_extract(&raw_path, 60);

    let settings = FeaturePipelineSettings::load(dir.path()).unwrap();
    let summary = FeaturePipeline::new(settings).run().unwrap();

    assert_eq!(summary.rows_extracted, 60);
    // the first day has no previous sunshine value
    assert_eq!(summary.rows_loaded, 59);
    assert_eq!(summary.upsert.inserted, 59);
    assert_eq!(summary.upsert.total, 59);
    assert!(summary.range_violations.is_empty());
    assert_eq!(summary.feature_view, "weather_basic");
    assert!(!raw_path.exists(), "raw extract should be deleted");

    let store = LocalFeatureStore::open(dir.path().join("store")).unwrap();
    let group = store.feature_group("weather", 1).unwrap();
    assert_eq!(group.n_rows, 59);
    assert!(group.columns.contains(&"tsun_label".to_string()));
    assert_eq!(
        group.feature_descriptions.get("tsun").map(String::as_str),
        Some("The daily sunshine total in minutes.")
    );
    assert!(store.get_feature_view("weather_basic", 1).is_ok());
}

#[test]
fn test_feature_rows_are_sorted_and_labelled() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = common::write_configs(dir.path(), false);
    common::write_raw_extract(&raw_path, 10);
    FeaturePipeline::new(FeaturePipelineSettings::load(dir.path()).unwrap())
        .run()
        .unwrap();

    let store = LocalFeatureStore::open(dir.path().join("store")).unwrap();
    let range = TimeRange::new(
        parse_date("2024-01-01").unwrap(),
        parse_date("2024-01-31").unwrap(),
    )
    .unwrap();
    let df = store.fetch("weather_basic", 1, &range).unwrap();

    assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
    let days = column_days(&df, "date").unwrap();
    assert!(days.windows(2).all(|w| w[0] < w[1]));

    // label of day i is the sunshine of day i - 1
    let tsun = column_f64(&df, "tsun").unwrap();
    let label = column_f64(&df, "tsun_label").unwrap();
    for i in 1..df.height() {
        assert_eq!(label[i], tsun[i - 1]);
    }
    // rounded to whole numbers
    assert!(column_f64(&df, "tavg")
        .unwrap()
        .into_iter()
        .flatten()
        .all(|v| v.fract() == 0.0));
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = common::write_configs(dir.path(), false);

    common::write_raw_extract(&raw_path, 30);
    let first = FeaturePipeline::new(FeaturePipelineSettings::load(dir.path()).unwrap())
        .run()
        .unwrap();

    common::write_raw_extract(&raw_path, 30);
    let second = FeaturePipeline::new(FeaturePipelineSettings::load(dir.path()).unwrap())
        .run()
        .unwrap();

    assert_eq!(first.upsert.total, 29);
    assert_eq!(second.upsert.inserted, 0);
    assert_eq!(second.upsert.updated, 29);
    assert_eq!(second.upsert.total, 29);
}

#[test]
fn test_missing_extract_without_api_fails() {
    let dir = tempfile::tempdir().unwrap();
    common::write_configs(dir.path(), false);

    // no cached file and an unreachable endpoint
    let result = FeaturePipeline::new(FeaturePipelineSettings::load(dir.path()).unwrap()).run();
    assert!(result.is_err());
    assert!(!dir.path().join("store").join("groups").join("weather_v1").exists());
}
