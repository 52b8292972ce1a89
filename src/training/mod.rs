//! Model training module
//!
//! - XGBoost-style gradient-boosted regression trees
//! - Time-series trainer with cross-validated hyperparameter search
//! - Regression metrics
//! - Versioned model registry

mod dataset;
mod metrics;
mod registry;
mod trainer;
pub mod xgboost;

pub use dataset::{split_features_label, FeatureMatrix};
pub use metrics::{mean_absolute_error, ModelMetrics};
pub use registry::{ModelRegistry, ModelStatus, RegisteredModel, RegistryEntry};
pub use trainer::{
    score, xgboost_search_space, SearchResult, TimeSeriesTrainer, TrainedModel, TrainerConfig,
};
pub use xgboost::{Objective, XGBoostConfig, XGBoostRegressor};
