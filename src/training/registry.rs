//! Model registry
//!
//! Stores every trained model as a versioned JSON artifact under
//! `<root>/<name>/v<version>.json` and keeps an `index.json` of entries.

use super::metrics::ModelMetrics;
use super::trainer::TrainedModel;
use crate::error::{PipelineError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Lifecycle stage of a registered model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelStatus::Development => "Development",
            ModelStatus::Staging => "Staging",
            ModelStatus::Production => "Production",
        };
        f.write_str(s)
    }
}

impl FromStr for ModelStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(ModelStatus::Development),
            "staging" => Ok(ModelStatus::Staging),
            "production" => Ok(ModelStatus::Production),
            _ => Err(PipelineError::invalid_parameter(
                "model_status",
                s,
                "expected Development, Staging or Production",
            )),
        }
    }
}

/// A model artifact as stored in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub version: u32,
    pub status: ModelStatus,
    pub description: String,
    pub metrics: ModelMetrics,
    pub feature_names: Vec<String>,
    pub registered_at: String,
    pub model: TrainedModel,
}

/// Registry entry (metadata only, without model data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub version: u32,
    pub status: ModelStatus,
    pub metrics: ModelMetrics,
    /// File path relative to registry root
    pub path: String,
    pub registered_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryIndex {
    models: BTreeMap<String, Vec<RegistryEntry>>,
}

/// Model registry for managing versioned models
#[derive(Debug)]
pub struct ModelRegistry {
    root: PathBuf,
    index: RegistryIndex,
}

impl ModelRegistry {
    /// Create or open registry at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            let file = File::open(&index_path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            RegistryIndex::default()
        };

        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn save_index(&self) -> Result<()> {
        let file = File::create(self.root.join("index.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.index)?;
        Ok(())
    }

    /// Register a trained model under `name` with the next free version
    pub fn register(
        &mut self,
        name: &str,
        model: &TrainedModel,
        metrics: ModelMetrics,
        status: ModelStatus,
        description: &str,
    ) -> Result<RegistryEntry> {
        let version = self
            .index
            .models
            .get(name)
            .and_then(|entries| entries.iter().map(|e| e.version).max())
            .unwrap_or(0)
            + 1;

        let model_dir = self.root.join(name);
        fs::create_dir_all(&model_dir)?;
        let file_name = format!("v{}.json", version);
        let relative_path = format!("{}/{}", name, file_name);
        let registered_at = Utc::now().to_rfc3339();

        let artifact = RegisteredModel {
            name: name.to_string(),
            version,
            status,
            description: description.to_string(),
            metrics: metrics.clone(),
            feature_names: model.feature_names().to_vec(),
            registered_at: registered_at.clone(),
            model: model.clone(),
        };
        let file = File::create(model_dir.join(&file_name))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &artifact)?;

        let entry = RegistryEntry {
            name: name.to_string(),
            version,
            status,
            metrics,
            path: relative_path,
            registered_at,
        };
        self.index
            .models
            .entry(name.to_string())
            .or_default()
            .push(entry.clone());
        self.save_index()?;

        info!(model = name, version, status = %status, "Model registered");
        Ok(entry)
    }

    fn entries(&self, name: &str) -> Result<&[RegistryEntry]> {
        self.index
            .models
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PipelineError::Data(format!("Model not found: {}", name)))
    }

    /// Get latest version of a model
    pub fn get_latest(&self, name: &str) -> Result<RegisteredModel> {
        let latest = self
            .entries(name)?
            .iter()
            .max_by_key(|e| e.version)
            .ok_or_else(|| PipelineError::Data(format!("No versions found: {}", name)))?;
        self.load(&latest.path)
    }

    /// Get specific version of a model
    pub fn get_version(&self, name: &str, version: u32) -> Result<RegisteredModel> {
        let entry = self
            .entries(name)?
            .iter()
            .find(|e| e.version == version)
            .ok_or_else(|| PipelineError::Data(format!("Version {} of {} not found", version, name)))?;
        self.load(&entry.path)
    }

    fn load(&self, rel_path: &str) -> Result<RegisteredModel> {
        let file = File::open(self.root.join(rel_path))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// List all models
    pub fn list_models(&self) -> Vec<String> {
        self.index.models.keys().cloned().collect()
    }

    /// List versions of a model
    pub fn list_versions(&self, name: &str) -> Vec<u32> {
        self.index
            .models
            .get(name)
            .map(|entries| entries.iter().map(|e| e.version).collect())
            .unwrap_or_default()
    }
}
