//! Hyperparameter optimization module (HyperOptX)
//!
//! Sequential search over a typed parameter space with
//! random and Tree-structured Parzen Estimator samplers.

mod config;
mod optimizer;
mod samplers;
mod search_space;

pub use config::{OptimizationConfig, OptimizeDirection};
pub use optimizer::{HyperOptX, Study, TrialResult};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TpeSampler};
pub use search_space::{HyperparameterSet, Parameter, ParameterType, ParameterValue, SearchSpace};
