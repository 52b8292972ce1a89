//! Time series module
//!
//! Provides time-aware building blocks:
//! - Calendar-window rolling features
//! - Expanding-window cross-validation folds

mod features;
mod validation;

pub use features::{RollingStat, RollingWindow, TimeFeatureAugmenter, TimeFeatureConfig, TimeWindowFeatures};
pub use validation::{ExpandingWindowSplit, Fold};
