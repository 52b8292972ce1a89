//! Feature store on the local filesystem
//!
//! Layout under the root directory:
//! - `groups/<name>_v<version>/metadata.json` and `data.parquet`
//! - `views/<name>_v<version>.json`

use super::{FeatureGroupSpec, FeatureSink, FeatureSource, FeatureViewSpec, TimeRange, WriteOptions};
use crate::error::{PipelineError, Result};
use crate::utils::frame::{column_days, column_names, sort_by_date, take_rows};
use crate::utils::{days_to_date, DataLoader, DataSaver};
use chrono::Utc;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stored state of a feature group, without its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroupMetadata {
    pub spec: FeatureGroupSpec,
    /// Column names in stored order, empty until the first write
    pub columns: Vec<String>,
    pub feature_descriptions: BTreeMap<String, String>,
    pub n_rows: usize,
    pub created_at: String,
    pub updated_at: String,
}

/// Stored definition of a feature view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureViewMetadata {
    pub spec: FeatureViewSpec,
    pub created_at: String,
}

/// Row counts of one upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Incoming rows with a new identity
    pub inserted: usize,
    /// Incoming rows that replaced a stored row
    pub updated: usize,
    /// Rows stored after the write
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct LocalFeatureStore {
    root: PathBuf,
    loader: DataLoader,
}

fn check_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PipelineError::FeatureStore(format!(
            "invalid {} name '{}': use letters, digits, '_' or '-'",
            kind, name
        )))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Identity of every row: key column values joined with a separator
fn row_keys(df: &DataFrame, key_columns: &[String]) -> Result<Vec<String>> {
    let columns = key_columns
        .iter()
        .map(|name| {
            df.column(name).map_err(|_| {
                PipelineError::FeatureStore(format!("key column '{}' missing from data", name))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    (0..df.height())
        .map(|row| {
            let mut parts = Vec::with_capacity(columns.len());
            for (column, name) in columns.iter().zip(key_columns) {
                let value = column.get(row)?;
                if value.is_null() {
                    return Err(PipelineError::FeatureStore(format!(
                        "row {} has a null key in column '{}'",
                        row, name
                    )));
                }
                parts.push(value.to_string());
            }
            Ok(parts.join("\u{1f}"))
        })
        .collect()
}

impl LocalFeatureStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("groups"))?;
        fs::create_dir_all(root.join("views"))?;
        Ok(Self {
            root,
            loader: DataLoader::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, name: &str, version: u32) -> PathBuf {
        self.root.join("groups").join(format!("{}_v{}", name, version))
    }

    fn view_path(&self, name: &str, version: u32) -> PathBuf {
        self.root.join("views").join(format!("{}_v{}.json", name, version))
    }

    /// Load a feature group's metadata, creating the group when it does not
    /// exist. An existing group must have the same keys and event time.
    pub fn get_or_create_feature_group(&self, spec: &FeatureGroupSpec) -> Result<FeatureGroupMetadata> {
        check_name("feature group", &spec.name)?;
        if spec.primary_keys.is_empty() {
            return Err(PipelineError::FeatureStore(format!(
                "feature group '{}' needs at least one primary key",
                spec.name
            )));
        }

        let path = self.group_dir(&spec.name, spec.version).join("metadata.json");
        if path.exists() {
            let metadata: FeatureGroupMetadata = read_json(&path)?;
            if metadata.spec.primary_keys != spec.primary_keys
                || metadata.spec.event_time != spec.event_time
            {
                return Err(PipelineError::FeatureStore(format!(
                    "feature group '{}' v{} exists with keys {:?} and event time '{}'",
                    spec.name, spec.version, metadata.spec.primary_keys, metadata.spec.event_time
                )));
            }
            return Ok(metadata);
        }

        let now = Utc::now().to_rfc3339();
        let metadata = FeatureGroupMetadata {
            spec: spec.clone(),
            columns: Vec::new(),
            feature_descriptions: BTreeMap::new(),
            n_rows: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        write_json(&path, &metadata)?;
        info!(group = %spec.name, version = spec.version, "Created feature group");
        Ok(metadata)
    }

    /// Metadata of an existing feature group
    pub fn feature_group(&self, name: &str, version: u32) -> Result<FeatureGroupMetadata> {
        let path = self.group_dir(name, version).join("metadata.json");
        if !path.exists() {
            return Err(PipelineError::FeatureStore(format!(
                "feature group '{}' v{} not found",
                name, version
            )));
        }
        read_json(&path)
    }

    /// All stored rows of a feature group
    pub fn read_feature_group(&self, name: &str, version: u32) -> Result<DataFrame> {
        let metadata = self.feature_group(name, version)?;
        let path = self.group_dir(name, version).join("data.parquet");
        if !path.exists() {
            return Err(PipelineError::FeatureStore(format!(
                "feature group '{}' v{} has no data (columns {:?})",
                name, version, metadata.columns
            )));
        }
        self.loader.load_parquet(&path)
    }

    /// Attach a description to a stored feature
    pub fn update_feature_description(
        &self,
        group: &str,
        version: u32,
        feature: &str,
        description: &str,
    ) -> Result<()> {
        let mut metadata = self.feature_group(group, version)?;
        if !metadata.columns.iter().any(|c| c == feature) {
            return Err(PipelineError::FeatureStore(format!(
                "feature '{}' not in feature group '{}'",
                feature, group
            )));
        }
        metadata
            .feature_descriptions
            .insert(feature.to_string(), description.trim().to_string());
        metadata.updated_at = Utc::now().to_rfc3339();
        write_json(&self.group_dir(group, version).join("metadata.json"), &metadata)
    }

    /// Create a feature view over an existing feature group. Creating the
    /// same view twice returns the stored definition.
    pub fn create_feature_view(&self, spec: &FeatureViewSpec) -> Result<FeatureViewMetadata> {
        check_name("feature view", &spec.name)?;
        let group = self.feature_group(&spec.feature_group, spec.feature_group_version)?;
        if let Some(label) = &spec.label {
            if !group.columns.iter().any(|c| c == label) {
                return Err(PipelineError::FeatureStore(format!(
                    "label '{}' not in feature group '{}'",
                    label, spec.feature_group
                )));
            }
        }

        let path = self.view_path(&spec.name, spec.version);
        if path.exists() {
            let existing: FeatureViewMetadata = read_json(&path)?;
            if existing.spec.feature_group != spec.feature_group
                || existing.spec.feature_group_version != spec.feature_group_version
                || existing.spec.label != spec.label
            {
                return Err(PipelineError::FeatureStore(format!(
                    "feature view '{}' v{} already exists with a different definition",
                    spec.name, spec.version
                )));
            }
            debug!(view = %spec.name, "Feature view already exists");
            return Ok(existing);
        }

        let metadata = FeatureViewMetadata {
            spec: spec.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        write_json(&path, &metadata)?;
        info!(view = %spec.name, version = spec.version, group = %spec.feature_group, "Created feature view");
        Ok(metadata)
    }

    pub fn get_feature_view(&self, name: &str, version: u32) -> Result<FeatureViewMetadata> {
        let path = self.view_path(name, version);
        if !path.exists() {
            return Err(PipelineError::FeatureStore(format!(
                "feature view '{}' v{} not found",
                name, version
            )));
        }
        read_json(&path)
    }
}

impl FeatureSink for LocalFeatureStore {
    fn upsert(
        &mut self,
        data: &DataFrame,
        group: &FeatureGroupSpec,
        options: &WriteOptions,
    ) -> Result<UpsertSummary> {
        let mut metadata = self.get_or_create_feature_group(group)?;
        let mut key_columns = group.primary_keys.clone();
        if !key_columns.contains(&group.event_time) {
            key_columns.push(group.event_time.clone());
        }
        let incoming_keys = row_keys(data, &key_columns)?;

        let dir = self.group_dir(&group.name, group.version);
        let data_path = dir.join("data.parquet");
        let existing = if !options.overwrite && data_path.exists() {
            Some(self.loader.load_parquet(&data_path)?)
        } else {
            None
        };

        let (combined, existing_keys) = match existing {
            Some(stored) => {
                let stored_columns = column_names(&stored);
                let incoming: HashSet<String> = column_names(data).into_iter().collect();
                if incoming != stored_columns.iter().cloned().collect::<HashSet<_>>() {
                    return Err(PipelineError::SchemaMismatch {
                        expected: stored_columns,
                        actual: column_names(data),
                    });
                }
                let aligned = data.select(stored_columns)?;
                let keys: HashSet<String> = row_keys(&stored, &key_columns)?.into_iter().collect();
                (stored.vstack(&aligned)?, keys)
            }
            None => (data.clone(), HashSet::new()),
        };

        // the last occurrence of an identity wins, incoming rows come last
        let keys = row_keys(&combined, &key_columns)?;
        let mut last: HashMap<&str, usize> = HashMap::with_capacity(keys.len());
        for (idx, key) in keys.iter().enumerate() {
            last.insert(key.as_str(), idx);
        }
        let keep: Vec<usize> = (0..keys.len())
            .filter(|&idx| last.get(keys[idx].as_str()) == Some(&idx))
            .collect();

        let mut merged = sort_by_date(&take_rows(&combined, &keep)?, &group.event_time)?;

        let distinct_incoming: HashSet<&String> = incoming_keys.iter().collect();
        let updated = distinct_incoming
            .iter()
            .filter(|k| existing_keys.contains(k.as_str()))
            .count();
        let summary = UpsertSummary {
            inserted: distinct_incoming.len() - updated,
            updated,
            total: merged.height(),
        };

        fs::create_dir_all(&dir)?;
        DataSaver::save_parquet(&mut merged, &data_path)?;

        metadata.columns = column_names(&merged);
        metadata.n_rows = merged.height();
        metadata.updated_at = Utc::now().to_rfc3339();
        write_json(&dir.join("metadata.json"), &metadata)?;

        info!(
            group = %group.name,
            version = group.version,
            inserted = summary.inserted,
            updated = summary.updated,
            total = summary.total,
            overwrite = options.overwrite,
            "Upserted feature rows"
        );
        Ok(summary)
    }
}

impl FeatureSource for LocalFeatureStore {
    fn fetch(&self, view: &str, version: u32, range: &TimeRange) -> Result<DataFrame> {
        let view = self.get_feature_view(view, version)?;
        let group = self.feature_group(&view.spec.feature_group, view.spec.feature_group_version)?;
        let data = self.read_feature_group(&group.spec.name, group.spec.version)?;
        let event_time = &group.spec.event_time;

        let days = column_days(&data, event_time)?;
        let rows: Vec<usize> = days
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some_and(|d| range.contains(days_to_date(d))))
            .map(|(i, _)| i)
            .collect();

        let selected = sort_by_date(&take_rows(&data, &rows)?, event_time)?;
        if let Some(label) = &view.spec.label {
            if selected.column(label).is_err() {
                return Err(PipelineError::FeatureStore(format!(
                    "label '{}' missing from feature view '{}'",
                    label, view.spec.name
                )));
            }
        }
        info!(
            view = %view.spec.name,
            rows = selected.height(),
            start = %range.start,
            end = %range.end,
            "Fetched feature view"
        );
        Ok(selected)
    }
}
