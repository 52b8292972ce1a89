//! Sunshine MLOps - daily sunshine forecasting pipelines
//!
//! This crate provides two pipelines around a local feature store:
//! - A feature pipeline that extracts daily weather observations from the
//!   Meteostat API, cleans them and upserts them into a feature group
//! - A training pipeline that reads a feature view back, adds time-window
//!   features and fits a gradient-boosted regressor, optionally tuned with
//!   expanding-window cross-validation, then registers the model
//!
//! # Modules
//!
//! ## Pipelines
//! - [`pipeline`] - Feature and training pipeline orchestration
//! - [`etl`] - Meteostat extract, transform and cleanup
//! - [`feature_store`] - Feature groups and feature views on disk
//!
//! ## Modelling
//! - [`training`] - XGBoost regressor, time-series trainer, model registry
//! - [`optimizer`] - Hyperparameter search (TPE and random sampling)
//! - [`timeseries`] - Rolling features and expanding-window folds
//!
//! ## Support
//! - [`config`] - Settings files and environment overrides
//! - [`cli`] - Command-line interface
//! - [`utils`] - Dates, DataFrame helpers, file IO

// Core error handling
pub mod error;

// Pipelines
pub mod etl;
pub mod feature_store;
pub mod pipeline;

// Modelling
pub mod optimizer;
pub mod timeseries;
pub mod training;

// Support
pub mod cli;
pub mod config;
pub mod utils;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration
    pub use crate::config::{FeaturePipelineSettings, FeatureStoreSettings, MeteostatSettings, TrainingSettings};

    // Pipelines
    pub use crate::pipeline::{FeaturePipeline, TrainingPipeline};
    pub use crate::etl::{transform, TransformOptions};
    pub use crate::feature_store::{FeatureSink, FeatureSource, LocalFeatureStore, TimeRange};

    // Training
    pub use crate::training::{
        FeatureMatrix, ModelMetrics, ModelRegistry, ModelStatus, TimeSeriesTrainer, TrainedModel,
        TrainerConfig, XGBoostConfig,
    };

    // Optimization
    pub use crate::optimizer::{HyperOptX, HyperparameterSet, OptimizationConfig, SamplerType, SearchSpace};

    // Time series
    pub use crate::timeseries::{ExpandingWindowSplit, TimeFeatureAugmenter, TimeWindowFeatures};
}
