//! Small DataFrame helpers built on polars primitives

use crate::error::{PipelineError, Result};
use super::dates::{date_to_days, parse_date};
use chrono::NaiveDate;
use polars::prelude::*;

/// Column names in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Fetch a column, mapping a missing name to a data error
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::Data(format!("column '{}' not found", name)))
}

/// Read a numeric column as nullable f64 values
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?;
    if !column.dtype().is_primitive_numeric() {
        return Err(PipelineError::Data(format!(
            "column '{}' has non-numeric type {}",
            name,
            column.dtype()
        )));
    }
    let as_f64 = column.cast(&DataType::Float64)?;
    Ok(as_f64.f64()?.into_iter().collect())
}

/// Read a date-like column as days since the epoch.
///
/// `Date` columns are read directly; string columns are parsed with [`parse_date`].
/// Unparseable strings become `None`.
pub fn column_days(df: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
    let column = require_column(df, name)?;
    match column.dtype() {
        DataType::Date => {
            let physical = column.cast(&DataType::Int32)?;
            Ok(physical.i32()?.into_iter().collect())
        }
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_date).map(date_to_days))
            .collect()),
        other => Err(PipelineError::Data(format!(
            "column '{}' has type {}, expected a date",
            name, other
        ))),
    }
}

/// Build a polars `Date` series from calendar dates
pub fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> Result<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(date_to_days)).collect();
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?)
}

/// Select rows by position, preserving the order of `indices`
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Stable sort by a date column, rows with a missing date last
pub fn sort_by_date(df: &DataFrame, date_column: &str) -> Result<DataFrame> {
    let days = column_days(df, date_column)?;
    let mut order: Vec<usize> = (0..days.len()).collect();
    order.sort_by_key(|&i| (days[i].is_none(), days[i]));
    take_rows(df, &order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "date" => &["2024-01-03", "2024-01-01", "2024-01-02"],
            "tavg" => &[3.0, 1.0, 2.0],
            "station" => &["a", "b", "c"]
        )
        .unwrap()
    }

    #[test]
    fn test_sort_by_string_date() {
        let sorted = sort_by_date(&frame(), "date").unwrap();
        let tavg = column_f64(&sorted, "tavg").unwrap();
        assert_eq!(tavg, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_date_series_round_trip() {
        let dates = vec![NaiveDate::from_ymd_opt(2024, 1, 1), None];
        let series = date_series("date", &dates).unwrap();
        assert_eq!(series.dtype(), &DataType::Date);

        let df = DataFrame::new(vec![series.into()]).unwrap();
        let days = column_days(&df, "date").unwrap();
        assert_eq!(days, vec![Some(19_723), None]);
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let err = column_f64(&frame(), "station").unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn test_take_rows_keeps_requested_order() {
        let picked = take_rows(&frame(), &[2, 0]).unwrap();
        assert_eq!(column_f64(&picked, "tavg").unwrap(), vec![Some(2.0), Some(3.0)]);
    }
}
