//! Time-window feature engineering on DataFrames

use crate::error::{PipelineError, Result};
use crate::utils::frame::{column_days, column_f64, sort_by_date};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Appends derived, time-dependent columns to a dataset
pub trait TimeFeatureAugmenter {
    /// Return a copy of `df`, sorted by `timestamp_col`, with extra feature columns
    fn augment(&self, df: &DataFrame, timestamp_col: &str) -> Result<DataFrame>;
}

/// Rolling statistics types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RollingStat {
    Mean,
    Sum,
    Min,
    Max,
    /// Sample standard deviation (ddof = 1)
    Std,
}

impl RollingStat {
    fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        match self {
            RollingStat::Mean => Some(values.iter().sum::<f64>() / n),
            RollingStat::Sum => Some(values.iter().sum()),
            RollingStat::Min => Some(values.iter().copied().fold(f64::INFINITY, f64::min)),
            RollingStat::Max => Some(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            RollingStat::Std => {
                if values.len() < 2 {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Some(var.sqrt())
            }
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            RollingStat::Mean => "mean",
            RollingStat::Sum => "sum",
            RollingStat::Min => "min",
            RollingStat::Max => "max",
            RollingStat::Std => "std",
        }
    }
}

/// A rolling statistic over a calendar window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingWindow {
    /// Column the statistic is computed from
    pub source: String,
    /// Window length in days; a row at day `t` covers days `(t - window_days, t]`
    pub window_days: u32,
    pub stat: RollingStat,
    /// Minimum non-null observations, otherwise the output is null
    pub min_periods: usize,
    /// Output column name, `{source}_rolling_{stat}` when unset
    pub output: Option<String>,
}

impl RollingWindow {
    pub fn new(source: impl Into<String>, window_days: u32, stat: RollingStat) -> Self {
        Self {
            source: source.into(),
            window_days,
            stat,
            min_periods: 1,
            output: None,
        }
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output = Some(name.into());
        self
    }

    pub fn with_min_periods(mut self, n: usize) -> Self {
        self.min_periods = n.max(1);
        self
    }

    pub fn output_name(&self) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| format!("{}_rolling_{}", self.source, self.stat.suffix()))
    }

    /// Compute the statistic for every row. `days` must be sorted ascending.
    fn compute(&self, days: &[i32], values: &[Option<f64>]) -> Vec<Option<f64>> {
        let width = self.window_days as i64;
        let mut start = 0;
        let mut out = Vec::with_capacity(days.len());
        let mut window: Vec<f64> = Vec::new();

        for i in 0..days.len() {
            while i64::from(days[i]) - i64::from(days[start]) >= width {
                start += 1;
            }
            window.clear();
            window.extend(
                values[start..=i]
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|v| !v.is_nan()),
            );
            let value = if window.len() >= self.min_periods {
                self.stat.apply(&window)
            } else {
                None
            };
            out.push(value);
        }
        out
    }
}

/// Configuration for time-based features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeFeatureConfig {
    pub rolling: Vec<RollingWindow>,
}

impl Default for TimeFeatureConfig {
    fn default() -> Self {
        Self {
            rolling: vec![
                RollingWindow::new("tavg", 7, RollingStat::Mean).with_output("tavg_rolling_mean"),
            ],
        }
    }
}

/// Calendar-window feature generator
#[derive(Debug, Clone, Default)]
pub struct TimeWindowFeatures {
    config: TimeFeatureConfig,
}

impl TimeWindowFeatures {
    pub fn new(config: TimeFeatureConfig) -> Self {
        Self { config }
    }

    /// Names of the columns `augment` appends
    pub fn feature_names(&self) -> Vec<String> {
        self.config.rolling.iter().map(RollingWindow::output_name).collect()
    }
}

impl TimeFeatureAugmenter for TimeWindowFeatures {
    fn augment(&self, df: &DataFrame, timestamp_col: &str) -> Result<DataFrame> {
        let mut sorted = sort_by_date(df, timestamp_col)?;
        let days: Vec<i32> = column_days(&sorted, timestamp_col)?
            .into_iter()
            .enumerate()
            .map(|(row, d)| {
                d.ok_or_else(|| {
                    PipelineError::Data(format!(
                        "row {} has no value in time column '{}'",
                        row, timestamp_col
                    ))
                })
            })
            .collect::<Result<_>>()?;

        for window in &self.config.rolling {
            let values = column_f64(&sorted, &window.source)?;
            let feature = window.compute(&days, &values);
            let name = window.output_name();
            debug!(feature = %name, window_days = window.window_days, "Adding rolling feature");
            sorted.with_column(Series::new(name.as_str().into(), feature))?;
        }

        Ok(sorted)
    }
}
