//! Shared fixtures for the pipeline integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const RAW_TABLE_YAML: &str = r#"
WeatherData:
  columns: [date, tavg, prcp, pres, tsun]
  datatypes:
    date: String
    tavg: Float64
    prcp: Float64
    pres: Float64
    tsun: Float64
"#;

/// `days` daily records starting 2024-01-01, in reverse order
pub fn raw_records(days: u32) -> Vec<Value> {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..days)
        .rev()
        .map(|i| {
            let date = start + chrono::Duration::days(i64::from(i));
            let tavg = 2.0 + f64::from(i % 10) * 0.7;
            json!({
                "date": date.format("%Y-%m-%d").to_string(),
                "tavg": tavg,
                "prcp": f64::from(i % 4) * 1.3,
                "pres": 1005.0 + f64::from(i % 7),
                "tsun": 30.0 * tavg + f64::from(i % 3) * 10.0,
            })
        })
        .collect()
}

/// Write every settings file into `dir`, returning the raw extract path
pub fn write_configs(dir: &Path, tuning: bool) -> PathBuf {
    fs::write(dir.join("raw_data_table_config.yaml"), RAW_TABLE_YAML).unwrap();
    fs::write(
        dir.join("meteostat_credentials.env"),
        "API_KEY=test-key\nAPI_HOST=meteostat.p.rapidapi.com\n",
    )
    .unwrap();
    fs::write(
        dir.join("meteostat_settings.env"),
        "METEOSTAT_ENDPOINT=http://127.0.0.1:9/daily\n\
         STATION_ID=10637\n\
         START_DATE=2024-01-01\n\
         END_DATE=2024-02-29\n\
         TABLE_NAME=WeatherData\n\
         YAML_CONFIG_FILE=raw_data_table_config.yaml\n\
         OUTPUT_PATH=data/raw_weather.json\n",
    )
    .unwrap();
    fs::write(
        dir.join("feature_store_settings.env"),
        "FEATURE_STORE_ROOT=store\n\
         FEATURE_GROUP_NAME=weather\n\
         FEATURE_GROUP_VERSION=1\n\
         FEATURE_GROUP_PRIMARY_KEYS=date\n\
         FEATURE_GROUP_DESCRIPTION=Daily weather\n\
         FEATURE_GROUP_EVENT_TIME=date\n\
         FEATURE_VIEW_NAME=weather_basic\n",
    )
    .unwrap();
    fs::write(
        dir.join("training_settings.env"),
        format!(
            "FEATURE_STORE_ROOT=store\n\
             FEATURE_VIEW_NAME=weather_basic\n\
             LABEL=tsun_label\n\
             HYPERPARAMETER_TUNING={}\n\
             HYPERPARAMETER_TUNING_SEARCH_TRIALS=3\n\
             HYPERPARAMETER_TUNING_N_SPLITS=3\n\
             MODEL_NAME=sunshine\n\
             MODEL_STATUS=staging\n\
             REGISTRY_ROOT=registry\n\
             START_DATE=2024-01-01\n\
             END_DATE=2024-12-31\n",
            tuning
        ),
    )
    .unwrap();
    dir.join("data").join("raw_weather.json")
}

/// Place a cached raw extract so no request is made
pub fn write_raw_extract(path: &Path, days: u32) {
    sunshine_mlops::etl::write_raw_file(path, &raw_records(days)).unwrap();
}
