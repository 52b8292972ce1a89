//! Training pipeline: read features, augment, fit, register

use crate::config::TrainingSettings;
use crate::error::{PipelineError, Result};
use crate::feature_store::{FeatureSource, LocalFeatureStore, TimeRange};
use crate::optimizer::HyperparameterSet;
use crate::timeseries::{TimeFeatureAugmenter, TimeFeatureConfig, TimeWindowFeatures};
use crate::training::{
    split_features_label, ModelMetrics, ModelRegistry, RegistryEntry, TimeSeriesTrainer,
    TrainerConfig,
};
use std::fs;
use tracing::info;

/// What a training pipeline run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub n_samples: usize,
    pub feature_names: Vec<String>,
    pub metrics: ModelMetrics,
    /// Winning configuration, `None` without tuning
    pub best_params: Option<HyperparameterSet>,
    pub entry: RegistryEntry,
}

pub struct TrainingPipeline {
    settings: TrainingSettings,
    trainer: TrainerConfig,
    time_features: TimeFeatureConfig,
    timestamp_column: String,
}

impl TrainingPipeline {
    pub fn new(settings: TrainingSettings) -> Self {
        let trainer = TrainerConfig::default().with_random_state(settings.random_state);
        Self {
            settings,
            trainer,
            time_features: TimeFeatureConfig::default(),
            timestamp_column: "date".to_string(),
        }
    }

    pub fn with_trainer_config(mut self, config: TrainerConfig) -> Self {
        self.trainer = config;
        self
    }

    pub fn with_time_features(mut self, config: TimeFeatureConfig) -> Self {
        self.time_features = config;
        self
    }

    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    pub fn settings(&self) -> &TrainingSettings {
        &self.settings
    }

    /// Run against the feature store and registry configured in the settings
    pub fn run(&self) -> Result<TrainingSummary> {
        let store = LocalFeatureStore::open(&self.settings.feature_store_root)?;
        let mut registry = ModelRegistry::open(&self.settings.registry_root)?;
        self.run_with(&store, &mut registry)
    }

    pub fn run_with<S: FeatureSource>(
        &self,
        source: &S,
        registry: &mut ModelRegistry,
    ) -> Result<TrainingSummary> {
        let settings = &self.settings;
        let range = TimeRange::new(settings.start_date, settings.end_date)?;
        let data = source.fetch(&settings.feature_view_name, settings.feature_view_version, &range)?;
        info!(rows = data.height(), columns = data.width(), "Training data retrieved");
        if data.height() == 0 {
            return Err(PipelineError::InsufficientData { rows: 0, required: 1 });
        }

        let data = if settings.add_time_based_features {
            let augmented = TimeWindowFeatures::new(self.time_features.clone())
                .augment(&data, &self.timestamp_column)?;
            info!(columns = augmented.width(), "Created time-based features");
            augmented
        } else {
            data
        };

        let (x, y) = split_features_label(&data, &settings.label, &[self.timestamp_column.as_str()])?;

        let mut trainer = TimeSeriesTrainer::new(self.trainer.clone());
        trainer.fit(
            &x,
            &y,
            settings.hyperparameter_tuning,
            settings.hyperparameter_tuning_search_trials,
            settings.hyperparameter_tuning_n_splits,
        )?;
        let model = trainer.get_model().ok_or(PipelineError::ModelNotFitted)?;

        let predictions = model.predict(&x)?;
        let mut metrics = ModelMetrics::compute_regression(y.view(), predictions.view())?;
        metrics.n_features = x.ncols();
        metrics.training_time_secs = model.training_time_secs();
        metrics.cv_mae = trainer.search_result().map(|s| s.best_score);
        info!(mae = metrics.mae, rmse = metrics.rmse, r2 = metrics.r2, cv_mae = ?metrics.cv_mae, "In-sample metrics");

        let description = match trainer.search_result() {
            Some(search) => format!(
                "XGBoost regressor on '{}', tuned over {} trials",
                settings.label,
                search.trials.len()
            ),
            None => format!("XGBoost regressor on '{}'", settings.label),
        };
        let entry = registry.register(
            &settings.model_name,
            model,
            metrics.clone(),
            settings.model_status,
            &description,
        )?;

        if let Some(search) = trainer.search_result() {
            let path = registry
                .root()
                .join(&settings.model_name)
                .join(format!("v{}_search.json", entry.version));
            fs::write(&path, serde_json::to_string_pretty(search)?)?;
            info!(path = %path.display(), "Saved search history");
        }

        Ok(TrainingSummary {
            n_samples: x.nrows(),
            feature_names: x.names().to_vec(),
            metrics,
            best_params: trainer.search_result().map(|s| s.best_params.clone()),
            entry,
        })
    }
}
