//! Settings for the feature and training pipelines
//!
//! Every settings struct is read once from an env-style file inside a
//! config directory, with real environment variables taking precedence,
//! and then passed around as an immutable value.

use crate::error::{PipelineError, Result};
use crate::training::ModelStatus;
use chrono::{Duration, Local, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const METEOSTAT_CREDENTIALS_FILE: &str = "meteostat_credentials.env";
pub const METEOSTAT_SETTINGS_FILE: &str = "meteostat_settings.env";
pub const FEATURE_STORE_SETTINGS_FILE: &str = "feature_store_settings.env";
pub const TRAINING_SETTINGS_FILE: &str = "training_settings.env";

/// Days of history fetched when no explicit range is configured
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Key/value settings from an env-style file, optionally overlaid by the
/// process environment. Keys are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    values: HashMap<String, String>,
    use_process_env: bool,
    origin: String,
}

impl EnvSource {
    /// Read `path` without touching the process environment. A missing file
    /// yields an empty source so that environment variables alone can
    /// configure a run.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut values = HashMap::new();
        if path.exists() {
            let iter = dotenvy::from_path_iter(path).map_err(|e| {
                PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| {
                    PipelineError::Config(format!("invalid line in {}: {}", path.display(), e))
                })?;
                values.insert(key.to_ascii_lowercase(), value);
            }
        } else {
            debug!(path = %path.display(), "Settings file not found, using environment only");
        }
        Ok(Self {
            values,
            use_process_env: true,
            origin: path.display().to_string(),
        })
    }

    /// Build a source from literal pairs, ignoring the process environment
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
                .collect(),
            use_process_env: false,
            origin: "inline settings".to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if self.use_process_env {
            let env_value = std::env::var(key.to_ascii_uppercase())
                .or_else(|_| std::env::var(key.to_ascii_lowercase()))
                .ok();
            if env_value.is_some() {
                return env_value;
            }
        }
        self.values.get(&key.to_ascii_lowercase()).cloned()
    }

    /// First key of `keys` that is set
    fn get_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| {
            PipelineError::Config(format!("missing required setting '{}' ({})", key, self.origin))
        })
    }

    fn parse_value<T>(&self, key: &str, raw: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        raw.trim().parse().map_err(|e: T::Err| {
            PipelineError::Config(format!("setting '{}' = '{}' is invalid: {}", key, raw, e))
        })
    }

    pub fn require_parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.require(key)?;
        self.parse_value(key, &raw)
    }

    pub fn parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => self.parse_value(key, &raw),
            None => Ok(default),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(PipelineError::Config(format!(
                    "setting '{}' = '{}' is not a boolean",
                    key, raw
                ))),
            },
        }
    }

    fn date_or(&self, key: &str, default: NaiveDate) -> Result<NaiveDate> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                PipelineError::Config(format!("setting '{}' = '{}' is not a date: {}", key, raw, e))
            }),
        }
    }

    /// A list given either as `a,b` or as a JSON array `["a", "b"]`
    fn list(&self, key: &str) -> Result<Vec<String>> {
        let raw = self.require(key)?;
        let trimmed = raw.trim();
        let items: Vec<String> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed).map_err(|e| {
                PipelineError::Config(format!("setting '{}' is not a JSON list: {}", key, e))
            })?
        } else {
            trimmed.split(',').map(|s| s.trim().to_string()).collect()
        };
        let items: Vec<String> = items.into_iter().filter(|s| !s.is_empty()).collect();
        if items.is_empty() {
            return Err(PipelineError::Config(format!("setting '{}' is an empty list", key)));
        }
        Ok(items)
    }
}

/// Resolve `path` against `base` unless it is absolute
fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

/// Inclusive date range ending today
fn default_window() -> (NaiveDate, NaiveDate) {
    let today = Local::now().date_naive();
    (today - Duration::days(DEFAULT_LOOKBACK_DAYS), today)
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(PipelineError::Config(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    Ok(())
}

/// Meteostat API credentials
#[derive(Clone)]
pub struct MeteostatCredentials {
    pub api_key: String,
    pub api_host: String,
}

impl fmt::Debug for MeteostatCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeteostatCredentials")
            .field("api_key", &"***")
            .field("api_host", &self.api_host)
            .finish()
    }
}

impl MeteostatCredentials {
    pub fn from_source(source: &EnvSource) -> Result<Self> {
        Ok(Self {
            api_key: source.require("api_key")?,
            api_host: source.require("api_host")?,
        })
    }

    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::from_source(&EnvSource::from_file(&config_dir.join(METEOSTAT_CREDENTIALS_FILE))?)
    }
}

/// What to extract from Meteostat and where to put the raw file
#[derive(Debug, Clone)]
pub struct MeteostatSettings {
    pub endpoint: String,
    pub station_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub table_name: String,
    pub yaml_config_file: PathBuf,
    pub output_path: PathBuf,
}

impl MeteostatSettings {
    /// Relative file settings are resolved against `base_dir`
    pub fn from_source(source: &EnvSource, base_dir: &Path) -> Result<Self> {
        let (default_start, default_end) = default_window();
        let endpoint = source
            .get_any(&["meteostat_endpoint", "endpoint"])
            .ok_or_else(|| PipelineError::Config("missing required setting 'meteostat_endpoint'".to_string()))?;
        let settings = Self {
            endpoint,
            station_id: source.require("station_id")?,
            start_date: source.date_or("start_date", default_start)?,
            end_date: source.date_or("end_date", default_end)?,
            table_name: source.require("table_name")?,
            yaml_config_file: resolve(base_dir, &source.require("yaml_config_file")?),
            output_path: resolve(base_dir, &source.require("output_path")?),
        };
        check_range(settings.start_date, settings.end_date)?;
        Ok(settings)
    }

    pub fn load(config_dir: &Path) -> Result<Self> {
        let source = EnvSource::from_file(&config_dir.join(METEOSTAT_SETTINGS_FILE))?;
        Self::from_source(&source, config_dir)
    }
}

/// Where and how the feature pipeline writes features
#[derive(Debug, Clone)]
pub struct FeatureStoreSettings {
    pub root: PathBuf,
    pub feature_group_name: String,
    pub feature_group_version: u32,
    pub feature_group_primary_keys: Vec<String>,
    pub feature_group_description: String,
    pub feature_group_event_time: String,
    pub feature_view_name: String,
    pub feature_view_version: u32,
    /// Replace the stored table instead of merging into it
    pub overwrite: bool,
}

impl FeatureStoreSettings {
    pub fn from_source(source: &EnvSource, base_dir: &Path) -> Result<Self> {
        let root = source
            .get("feature_store_root")
            .unwrap_or_else(|| "feature_store".to_string());
        Ok(Self {
            root: resolve(base_dir, &root),
            feature_group_name: source.require("feature_group_name")?,
            feature_group_version: source.require_parsed("feature_group_version")?,
            feature_group_primary_keys: source.list("feature_group_primary_keys")?,
            feature_group_description: source
                .get("feature_group_description")
                .unwrap_or_default(),
            feature_group_event_time: source.require("feature_group_event_time")?,
            feature_view_name: source.require("feature_view_name")?,
            feature_view_version: source.parsed_or("feature_view_version", 1)?,
            overwrite: source.bool_or("overwrite", false)?,
        })
    }

    pub fn load(config_dir: &Path) -> Result<Self> {
        let source = EnvSource::from_file(&config_dir.join(FEATURE_STORE_SETTINGS_FILE))?;
        Self::from_source(&source, config_dir)
    }
}

/// Everything the feature pipeline needs
#[derive(Debug, Clone)]
pub struct FeaturePipelineSettings {
    pub credentials: MeteostatCredentials,
    pub meteostat: MeteostatSettings,
    pub store: FeatureStoreSettings,
}

impl FeaturePipelineSettings {
    pub fn load(config_dir: &Path) -> Result<Self> {
        Ok(Self {
            credentials: MeteostatCredentials::load(config_dir)?,
            meteostat: MeteostatSettings::load(config_dir)?,
            store: FeatureStoreSettings::load(config_dir)?,
        })
    }
}

/// Training pipeline settings
#[derive(Debug, Clone)]
pub struct TrainingSettings {
    pub feature_store_root: PathBuf,
    pub feature_view_name: String,
    pub feature_view_version: u32,
    pub label: String,
    pub add_time_based_features: bool,
    pub hyperparameter_tuning: bool,
    pub hyperparameter_tuning_search_trials: usize,
    pub hyperparameter_tuning_n_splits: usize,
    pub model_name: String,
    pub model_status: ModelStatus,
    pub registry_root: PathBuf,
    pub random_state: Option<u64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl TrainingSettings {
    pub fn from_source(source: &EnvSource, base_dir: &Path) -> Result<Self> {
        let (default_start, default_end) = default_window();
        let feature_view_name = source
            .get_any(&["feature_view_name", "feature_view_basic_features_name"])
            .ok_or_else(|| PipelineError::Config("missing required setting 'feature_view_name'".to_string()))?;
        let feature_view_version = match source
            .get_any(&["feature_view_version", "feature_view_basic_features_version"])
        {
            Some(raw) => source.parse_value("feature_view_version", &raw)?,
            None => 1,
        };
        let random_state = match source.get("random_state") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(source.parse_value("random_state", &raw)?),
            None => Some(42),
        };

        let settings = Self {
            feature_store_root: resolve(
                base_dir,
                &source.get("feature_store_root").unwrap_or_else(|| "feature_store".to_string()),
            ),
            feature_view_name,
            feature_view_version,
            label: source.require("label")?,
            add_time_based_features: source.bool_or("add_time_based_features", true)?,
            hyperparameter_tuning: source.bool_or("hyperparameter_tuning", false)?,
            hyperparameter_tuning_search_trials: source
                .parsed_or("hyperparameter_tuning_search_trials", 0)?,
            hyperparameter_tuning_n_splits: source.parsed_or("hyperparameter_tuning_n_splits", 3)?,
            model_name: source.require("model_name")?,
            model_status: source.parsed_or("model_status", ModelStatus::Development)?,
            registry_root: resolve(
                base_dir,
                &source.get("registry_root").unwrap_or_else(|| "model_registry".to_string()),
            ),
            random_state,
            start_date: source.date_or("start_date", default_start)?,
            end_date: source.date_or("end_date", default_end)?,
        };
        check_range(settings.start_date, settings.end_date)?;
        Ok(settings)
    }

    pub fn load(config_dir: &Path) -> Result<Self> {
        let source = EnvSource::from_file(&config_dir.join(TRAINING_SETTINGS_FILE))?;
        Self::from_source(&source, config_dir)
    }
}
