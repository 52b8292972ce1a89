//! Search space definition for hyperparameters

use crate::error::{PipelineError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float {
        low: f64,
        high: f64,
        log_scale: bool,
    },
    /// Integer parameter, both bounds inclusive
    Int {
        low: i64,
        high: i64,
        log_scale: bool,
    },
    /// Categorical parameter
    Categorical {
        choices: Vec<String>,
    },
    /// Boolean parameter
    Boolean,
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.into_iter().map(String::from).collect(),
            },
        }
    }

    /// Create a boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Boolean,
        }
    }

    /// Whether the parameter has an ordered numeric domain
    pub fn is_numeric(&self) -> bool {
        matches!(self.param_type, ParameterType::Float { .. } | ParameterType::Int { .. })
    }

    /// Sample a value uniformly (log-uniformly for log-scale parameters)
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float { .. } | ParameterType::Int { .. } => {
                self.from_unit(rng.gen::<f64>())
            }
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
            ParameterType::Boolean => ParameterValue::Bool(rng.gen()),
        }
    }

    /// Map a value of a numeric parameter into `[0, 1]`
    pub fn to_unit(&self, value: &ParameterValue) -> Option<f64> {
        let (low, high, log_scale) = self.numeric_bounds()?;
        let v = value.as_float()?;
        if high <= low {
            return Some(0.0);
        }
        let u = if log_scale {
            (v.ln() - low.ln()) / (high.ln() - low.ln())
        } else {
            (v - low) / (high - low)
        };
        Some(u.clamp(0.0, 1.0))
    }

    /// Map a point of `[0, 1]` back onto a numeric parameter's domain.
    ///
    /// Integer parameters round to the nearest integer inside the bounds.
    /// Non-numeric parameters map to their first choice.
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                ParameterValue::Float(scale(u, *low, *high, *log_scale))
            }
            ParameterType::Int { low, high, log_scale } => {
                // widen by half a step so both bounds are equally likely
                let (lo, hi) = if *log_scale {
                    (*low as f64, *high as f64)
                } else {
                    (*low as f64 - 0.5, *high as f64 + 0.5)
                };
                let v = scale(u, lo, hi, *log_scale).round() as i64;
                ParameterValue::Int(v.clamp(*low, *high))
            }
            ParameterType::Categorical { choices } => {
                ParameterValue::String(choices.first().cloned().unwrap_or_default())
            }
            ParameterType::Boolean => ParameterValue::Bool(false),
        }
    }

    /// Whether `value` lies inside this parameter's domain
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (&self.param_type, value) {
            (ParameterType::Float { low, high, .. }, ParameterValue::Float(v)) => {
                v >= low && v <= high
            }
            (ParameterType::Int { low, high, .. }, ParameterValue::Int(v)) => v >= low && v <= high,
            (ParameterType::Categorical { choices }, ParameterValue::String(s)) => {
                choices.iter().any(|c| c == s)
            }
            (ParameterType::Boolean, ParameterValue::Bool(_)) => true,
            _ => false,
        }
    }

    fn numeric_bounds(&self) -> Option<(f64, f64, bool)> {
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => Some((*low, *high, *log_scale)),
            ParameterType::Int { low, high, log_scale } => {
                Some((*low as f64, *high as f64, *log_scale))
            }
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(PipelineError::invalid_parameter(
                self.name.clone(),
                format!("{:?}", self.param_type),
                reason,
            ))
        };
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return invalid("bounds must be finite with low <= high");
                }
                if *log_scale && *low <= 0.0 {
                    return invalid("log-scale bounds must be positive");
                }
            }
            ParameterType::Int { low, high, log_scale } => {
                if low > high {
                    return invalid("low must not exceed high");
                }
                if *log_scale && *low <= 0 {
                    return invalid("log-scale bounds must be positive");
                }
            }
            ParameterType::Categorical { choices } => {
                if choices.is_empty() {
                    return invalid("at least one choice is required");
                }
            }
            ParameterType::Boolean => {}
        }
        Ok(())
    }
}

fn scale(u: f64, low: f64, high: f64, log_scale: bool) -> f64 {
    if log_scale {
        (low.ln() + u * (high.ln() - low.ln())).exp()
    } else {
        low + u * (high - low)
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// One sampled configuration, ordered by parameter name
pub type HyperparameterSet = BTreeMap<String, ParameterValue>;

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add a log-scale float parameter
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a categorical parameter
    pub fn categorical(self, name: impl Into<String>, choices: Vec<&str>) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    /// Add a boolean parameter
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(Parameter::boolean(name))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> HyperparameterSet {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Whether every parameter of the space has an in-domain value in `params`
    pub fn contains(&self, params: &HyperparameterSet) -> bool {
        self.parameters
            .iter()
            .all(|p| params.get(&p.name).is_some_and(|v| p.contains(v)))
    }

    /// Check bounds and name uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(PipelineError::Optimization("search space is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for p in &self.parameters {
            if !seen.insert(p.name.as_str()) {
                return Err(PipelineError::Optimization(format!(
                    "duplicate parameter '{}'",
                    p.name
                )));
            }
            p.validate()?;
        }
        Ok(())
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}
