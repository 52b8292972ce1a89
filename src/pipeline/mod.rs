//! End-to-end feature and training pipelines

mod feature;
mod training;

pub use feature::{feature_group_spec, feature_view_spec, FeaturePipeline, FeaturePipelineSummary};
pub use training::{TrainingPipeline, TrainingSummary};
