//! Cleaning of raw weather observations into feature rows

use crate::error::{PipelineError, Result};
use crate::utils::frame::{column_days, column_f64, require_column, sort_by_date};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Options for [`transform`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOptions {
    pub date_column: String,
    /// Column the label is derived from
    pub label_source: String,
    /// Rows the label is shifted by; row `i` takes row `i - shift`
    pub label_shift: i64,
    /// Decimal places float columns are rounded to
    pub decimals: u32,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            label_source: "tsun".to_string(),
            label_shift: 1,
            decimals: 0,
        }
    }
}

impl TransformOptions {
    pub fn label_column(&self) -> String {
        format!("{}_label", self.label_source)
    }
}

/// Parse a text date column into a polars `Date` column.
///
/// Accepts ISO dates, ISO date-times, `%m/%d/%y` and C-locale date-times;
/// values matching none of them become null.
pub fn normalize_dates(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let dtype = require_column(df, column)?.dtype().clone();
    if dtype == DataType::Date {
        return Ok(df.clone());
    }
    if dtype != DataType::String {
        return Err(PipelineError::Data(format!(
            "column '{}' has type {}, expected text dates",
            column, dtype
        )));
    }

    let days = column_days(df, column)?;
    let unparsed = days.iter().filter(|d| d.is_none()).count();
    if unparsed > 0 {
        debug!(column, unparsed, "Some dates could not be parsed");
    }
    let dates = Series::new(column.into(), days).cast(&DataType::Date)?;

    let mut out = df.clone();
    out.with_column(dates)?;
    Ok(out)
}

/// Round every float column to `decimals` places, half away from zero
pub fn round_float_columns(df: &DataFrame, decimals: u32) -> Result<DataFrame> {
    let factor = 10f64.powi(decimals as i32);
    let mut out = df.clone();

    for column in df.get_columns() {
        let dtype = column.dtype().clone();
        if !matches!(dtype, DataType::Float32 | DataType::Float64) {
            continue;
        }
        let name = column.name().to_string();
        let rounded: Vec<Option<f64>> = column_f64(df, &name)?
            .into_iter()
            .map(|v| v.map(|x| (x * factor).round() / factor))
            .collect();
        let series = Series::new(name.as_str().into(), rounded).cast(&dtype)?;
        out.with_column(series)?;
    }
    Ok(out)
}

/// Append `{column}_label`, the column shifted by `shift` rows
pub fn add_label_column(df: &DataFrame, column: &str, shift: i64) -> Result<DataFrame> {
    let source = require_column(df, column)?.as_materialized_series();
    let label = source.shift(shift).with_name(format!("{}_label", column).into());

    let mut out = df.clone();
    out.with_column(label)?;
    Ok(out)
}

/// Normalise dates, round floats, sort by date, add the shifted label,
/// then drop rows with any null.
pub fn transform(df: &DataFrame, options: &TransformOptions) -> Result<DataFrame> {
    info!(rows = df.height(), "Converting the date column to a date type");
    let df = normalize_dates(df, &options.date_column)?;

    info!(decimals = options.decimals, "Rounding float columns");
    let df = round_float_columns(&df, options.decimals)?;

    info!(
        source = %options.label_source,
        shift = options.label_shift,
        "Adding label column"
    );
    let df = sort_by_date(&df, &options.date_column)?;
    let df = add_label_column(&df, &options.label_source, options.label_shift)?;

    let before = df.height();
    let df = df.drop_nulls::<String>(None)?;
    info!(rows = df.height(), dropped = before - df.height(), "Transformed raw data");
    Ok(df)
}
