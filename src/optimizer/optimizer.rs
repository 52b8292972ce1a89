//! HyperOptX - sequential hyperparameter search

use super::{
    config::{OptimizationConfig, OptimizeDirection},
    samplers::{create_sampler, Sampler},
    search_space::{HyperparameterSet, SearchSpace},
};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Result of a single trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number, starting at 0
    pub trial_id: usize,
    /// Parameters used
    pub params: HyperparameterSet,
    /// Objective value
    pub value: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

/// Study containing all trials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    /// All trial results, in evaluation order
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
    /// Optimization direction
    pub direction: OptimizeDirection,
}

impl Study {
    /// Create a new study
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
            direction,
        }
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&HyperparameterSet> {
        self.best_trial().map(|t| &t.params)
    }

    /// Add a trial result. Only a strict improvement replaces the best trial,
    /// so the earliest of several equal scores is kept.
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        let is_better = match self.best_value() {
            None => true,
            Some(best_val) => match self.direction {
                OptimizeDirection::Minimize => result.value < best_val,
                OptimizeDirection::Maximize => result.value > best_val,
            },
        };

        if is_better {
            self.best_trial_idx = Some(idx);
        }

        self.trials.push(result);
    }

    /// History in the form samplers consume, oriented so lower is better
    fn history(&self) -> Vec<(HyperparameterSet, f64)> {
        self.trials
            .iter()
            .map(|t| {
                let score = match self.direction {
                    OptimizeDirection::Minimize => t.value,
                    OptimizeDirection::Maximize => -t.value,
                };
                (t.params.clone(), score)
            })
            .collect()
    }

    /// Save study to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load study from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Study> {
        let json = std::fs::read_to_string(path)?;
        let study: Study = serde_json::from_str(&json)?;
        Ok(study)
    }
}

/// Main hyperparameter optimizer
pub struct HyperOptX {
    config: OptimizationConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
    study: Study,
}

impl HyperOptX {
    /// Create a new optimizer
    pub fn new(config: OptimizationConfig, search_space: SearchSpace) -> Self {
        let sampler = create_sampler(config.sampler, config.random_state, config.n_startup_trials);
        let study = Study::new(config.direction);

        Self {
            config,
            search_space,
            sampler,
            study,
        }
    }

    /// Replace the sampler built from the configuration
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Run `n_trials` trials sequentially.
    ///
    /// The objective receives the trial index and the sampled parameters.
    /// The first failing trial aborts the search; its error is returned
    /// wrapped in [`PipelineError::TrialFailed`].
    pub fn optimize<F>(&mut self, mut objective: F) -> Result<&Study>
    where
        F: FnMut(usize, &HyperparameterSet) -> Result<f64>,
    {
        self.config.validate()?;
        self.search_space.validate()?;

        let start = Instant::now();
        self.study = Study::new(self.config.direction);

        for trial_id in 0..self.config.n_trials {
            let trial_start = Instant::now();
            let history = self.study.history();
            let params = self.sampler.sample(&self.search_space, &history);

            let value = objective(trial_id, &params)
                .and_then(|value| {
                    if value.is_finite() {
                        Ok(value)
                    } else {
                        Err(PipelineError::Optimization(format!(
                            "objective returned non-finite value {}",
                            value
                        )))
                    }
                })
                .map_err(|e| {
                    error!(trial = trial_id, error = %e, "Trial failed, aborting search");
                    PipelineError::TrialFailed {
                        trial: trial_id,
                        source: Box::new(e),
                    }
                })?;

            self.study.add_trial(TrialResult {
                trial_id,
                params,
                value,
                duration_secs: trial_start.elapsed().as_secs_f64(),
            });

            debug!(
                trial = trial_id,
                value,
                best = self.study.best_value().unwrap_or(value),
                "Trial complete"
            );
        }

        self.study.total_duration_secs = start.elapsed().as_secs_f64();
        if let Some(best) = self.study.best_trial() {
            info!(
                trials = self.study.trials.len(),
                best_trial = best.trial_id,
                best_value = best.value,
                "Search finished"
            );
        }

        Ok(&self.study)
    }

    /// Get the study results
    pub fn study(&self) -> &Study {
        &self.study
    }

    /// Consume the optimizer and return its study
    pub fn into_study(self) -> Study {
        self.study
    }
}
