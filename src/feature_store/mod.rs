//! Feature store
//!
//! Feature groups hold versioned tables keyed by primary keys and an event
//! time. Feature views name a feature group (and optionally a label) for
//! reading training data back by time range.

mod descriptions;
mod local;

pub use descriptions::{check_ranges, weather_feature_descriptions, FeatureDescription, RangeViolation};
pub use local::{FeatureGroupMetadata, FeatureViewMetadata, LocalFeatureStore, UpsertSummary};

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Inclusive range of event dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PipelineError::invalid_parameter(
                "time_range",
                format!("{}..{}", start, end),
                "start must not be after end",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Definition of a feature group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroupSpec {
    pub name: String,
    pub version: u32,
    pub description: String,
    pub primary_keys: Vec<String>,
    pub event_time: String,
}

/// How an upsert treats rows already stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Replace the whole table instead of merging into it
    pub overwrite: bool,
}

/// Definition of a feature view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureViewSpec {
    pub name: String,
    pub version: u32,
    pub description: String,
    pub feature_group: String,
    pub feature_group_version: u32,
    pub label: Option<String>,
}

/// Reads feature rows back out of a store
pub trait FeatureSource {
    /// Rows of a feature view whose event time lies in `range`, sorted by event time
    fn fetch(&self, view: &str, version: u32, range: &TimeRange) -> Result<DataFrame>;
}

/// Writes feature rows into a store
pub trait FeatureSink {
    /// Merge `data` into the feature group described by `group`.
    ///
    /// Rows are identified by the group's primary keys plus event time; an
    /// incoming row replaces a stored row with the same identity, so
    /// repeating an upsert leaves the table unchanged.
    fn upsert(
        &mut self,
        data: &DataFrame,
        group: &FeatureGroupSpec,
        options: &WriteOptions,
    ) -> Result<UpsertSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let range = TimeRange::new(d(1), d(10)).unwrap();
        assert!(range.contains(d(1)));
        assert!(range.contains(d(10)));
        assert!(!range.contains(d(11)));
        assert!(TimeRange::new(d(10), d(1)).is_err());
    }
}
