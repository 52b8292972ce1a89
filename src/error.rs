//! Error types for the sunshine pipelines

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type shared by the feature and training pipelines
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Insufficient data: {rows} rows, at least {required} required")]
    InsufficientData { rows: usize, required: usize },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Optimization error: {0}")]
    Optimization(String),

    #[error("Trial {trial} failed: {source}")]
    TrialFailed {
        trial: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feature store error: {0}")]
    FeatureStore(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Http(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::Data(format!("invalid shape: {}", err))
    }
}
