//! Time-series model trainer: optional hyperparameter search under
//! expanding-window cross-validation, then a refit on the full data.

use super::dataset::FeatureMatrix;
use super::metrics::mean_absolute_error;
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::{PipelineError, Result};
use crate::optimizer::{
    HyperOptX, HyperparameterSet, OptimizationConfig, OptimizeDirection, SamplerType, SearchSpace,
    Study, TrialResult,
};
use crate::timeseries::ExpandingWindowSplit;
use ndarray::{s, Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Regressor settings for untuned fits; searched values are overlaid on it
    pub model: XGBoostConfig,
    pub sampler: SamplerType,
    /// Random trials before the TPE sampler models the history
    pub n_startup_trials: usize,
    /// Seed for the sampler
    pub random_state: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            model: XGBoostConfig::default(),
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            random_state: Some(42),
        }
    }
}

impl TrainerConfig {
    pub fn with_model(mut self, model: XGBoostConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }
}

/// Hyperparameter domain searched by the trainer
pub fn xgboost_search_space() -> SearchSpace {
    SearchSpace::new()
        .int("n_estimators", 100, 1000)
        .int("max_depth", 3, 10)
        .float("learning_rate", 0.01, 0.3)
        .float("subsample", 0.5, 1.0)
        .float("colsample_bytree", 0.5, 1.0)
}

/// Outcome of a hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_params: HyperparameterSet,
    /// Mean validation MAE of the best trial
    pub best_score: f64,
    /// Index of the winning trial
    pub best_trial: usize,
    /// Every trial in evaluation order
    pub trials: Vec<TrialResult>,
}

impl SearchResult {
    fn from_study(study: &Study) -> Result<Self> {
        let best = study
            .best_trial()
            .ok_or_else(|| PipelineError::Optimization("search produced no trials".to_string()))?;
        Ok(Self {
            best_params: best.params.clone(),
            best_score: best.value,
            best_trial: best.trial_id,
            trials: study.trials.clone(),
        })
    }
}

/// A fitted regressor together with the feature schema it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    feature_names: Vec<String>,
    regressor: XGBoostRegressor,
    training_time_secs: f64,
}

impl TrainedModel {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn config(&self) -> &XGBoostConfig {
        self.regressor.config()
    }

    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    /// Predict one value per row of `x`, whose columns must match the training schema
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        if x.names() != self.feature_names.as_slice() {
            return Err(PipelineError::SchemaMismatch {
                expected: self.feature_names.clone(),
                actual: x.names().to_vec(),
            });
        }
        self.regressor.predict(x.view())
    }

    /// Split-count importances paired with feature names
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        match self.regressor.feature_importances() {
            Some(imp) => self.feature_names.iter().cloned().zip(imp.iter().copied()).collect(),
            None => Vec::new(),
        }
    }
}

/// Mean validation MAE of `params` across expanding-window folds.
///
/// Each fold fits a fresh regressor; folds run in parallel and their
/// scores are averaged in fold order.
pub fn score(
    params: &HyperparameterSet,
    base: &XGBoostConfig,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    n_splits: usize,
) -> Result<f64> {
    let config = base.clone().with_params(params)?;
    let folds = ExpandingWindowSplit::new(n_splits).split(x.nrows())?;

    let maes: Vec<f64> = folds
        .par_iter()
        .map(|fold| -> Result<f64> {
            let mut model = XGBoostRegressor::new(config.clone());
            model.fit(
                x.slice(s![fold.train.clone(), ..]),
                y.slice(s![fold.train.clone()]),
            )?;
            let preds = model.predict(x.slice(s![fold.validation.clone(), ..]))?;
            let mae = mean_absolute_error(y.slice(s![fold.validation.clone()]), preds.view())?;
            debug!(fold = fold.fold, train = fold.train_len(), mae, "Fold scored");
            Ok(mae)
        })
        .collect::<Result<_>>()?;

    Ok(maes.iter().sum::<f64>() / maes.len() as f64)
}

/// Fits gradient-boosted regressors on time-ordered data
#[derive(Debug, Clone)]
pub struct TimeSeriesTrainer {
    config: TrainerConfig,
    model: Option<TrainedModel>,
    search: Option<SearchResult>,
}

impl TimeSeriesTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            model: None,
            search: None,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit on `(x, y)`.
    ///
    /// With `tuning` set, `n_trials` configurations are scored with
    /// `n_splits` expanding-window folds and the best one is refit on all
    /// rows. Otherwise the configured model settings are fit directly.
    /// The held model only changes when the whole call succeeds.
    pub fn fit(
        &mut self,
        x: &FeatureMatrix,
        y: &Array1<f64>,
        tuning: bool,
        n_trials: usize,
        n_splits: usize,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::SchemaMismatch {
                expected: vec![format!("{} labels", x.nrows())],
                actual: vec![format!("{} labels", y.len())],
            });
        }

        let start = Instant::now();
        let (config, search) = if tuning {
            let search = self.search(x, y, n_trials, n_splits)?;
            let config = self.config.model.clone().with_params(&search.best_params)?;
            (config, Some(search))
        } else {
            (self.config.model.clone(), None)
        };

        let mut regressor = XGBoostRegressor::new(config);
        regressor.fit(x.view(), y.view())?;

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(
            rows = x.nrows(),
            features = x.ncols(),
            tuned = tuning,
            secs = training_time_secs,
            "Model fitted"
        );

        self.model = Some(TrainedModel {
            feature_names: x.names().to_vec(),
            regressor,
            training_time_secs,
        });
        self.search = search;
        Ok(())
    }

    fn search(
        &self,
        x: &FeatureMatrix,
        y: &Array1<f64>,
        n_trials: usize,
        n_splits: usize,
    ) -> Result<SearchResult> {
        if n_trials == 0 {
            return Err(PipelineError::invalid_parameter(
                "n_trials",
                n_trials,
                "hyperparameter search needs at least one trial",
            ));
        }
        // fail before any trial runs
        ExpandingWindowSplit::new(n_splits).split(x.nrows())?;

        info!(n_trials, n_splits, sampler = ?self.config.sampler, "Starting hyperparameter search");
        let opt_config = OptimizationConfig::new()
            .with_n_trials(n_trials)
            .with_direction(OptimizeDirection::Minimize)
            .with_sampler(self.config.sampler)
            .with_n_startup_trials(self.config.n_startup_trials)
            .with_random_state(self.config.random_state);

        let mut optimizer = HyperOptX::new(opt_config, xgboost_search_space());
        let base = &self.config.model;
        let study = optimizer
            .optimize(|_, params| score(params, base, x.view(), y.view(), n_splits))
            .map_err(|e| match e {
                PipelineError::TrialFailed { trial, source } => match *source {
                    PipelineError::Training(msg) => {
                        PipelineError::Training(format!("trial {}: {}", trial, msg))
                    }
                    other => PipelineError::TrialFailed {
                        trial,
                        source: Box::new(other),
                    },
                },
                other => other,
            })?;

        let result = SearchResult::from_study(study)?;
        info!(
            best_trial = result.best_trial,
            best_mae = result.best_score,
            "Hyperparameter search finished"
        );
        Ok(result)
    }

    /// Predict with the fitted model
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        self.model
            .as_ref()
            .ok_or(PipelineError::ModelNotFitted)?
            .predict(x)
    }

    pub fn get_model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Result of the most recent search, `None` after an untuned fit
    pub fn search_result(&self) -> Option<&SearchResult> {
        self.search.as_ref()
    }
}
