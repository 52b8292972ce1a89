//! Optimization configuration

use super::SamplerType;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Direction of optimization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    #[default]
    Minimize,
    Maximize,
}

/// Configuration for hyperparameter optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Optimization direction
    pub direction: OptimizeDirection,

    /// Sampler type
    pub sampler: SamplerType,

    /// Number of initial random samples before TPE kicks in
    pub n_startup_trials: usize,

    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_trials: 20,
            direction: OptimizeDirection::Minimize,
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            random_state: Some(42),
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set direction
    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(PipelineError::invalid_parameter(
                "n_trials",
                self.n_trials,
                "at least one trial is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizationConfig::default();
        assert_eq!(config.direction, OptimizeDirection::Minimize);
        assert_eq!(config.sampler, SamplerType::TPE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_trials_rejected() {
        let config = OptimizationConfig::new().with_n_trials(0);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }
}
