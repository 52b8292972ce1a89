//! Conversion between DataFrames and the dense matrices the trainer consumes

use crate::error::{PipelineError, Result};
use crate::utils::frame::{column_f64, column_names};
use ndarray::{Array1, Array2, ArrayView2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Named, row-ordered feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(PipelineError::Data(format!(
                "{} feature names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    /// Read `columns` from `df` in the given order. Nulls become NaN so that
    /// fitting and prediction report them instead of rows disappearing.
    pub fn from_dataframe(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let n_rows = df.height();
        let col_data: Vec<Vec<f64>> = columns
            .iter()
            .map(|name| {
                Ok(column_f64(df, name)?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect())
            })
            .collect::<Result<_>>()?;

        let values = Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| col_data[c][r]);
        Self::new(columns.to_vec(), values)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Split a dataset into a feature matrix and a label vector.
///
/// Every numeric column except `label` and `exclude` becomes a feature,
/// keeping frame order.
pub fn split_features_label(
    df: &DataFrame,
    label: &str,
    exclude: &[&str],
) -> Result<(FeatureMatrix, Array1<f64>)> {
    let y: Array1<f64> = column_f64(df, label)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();

    let features: Vec<String> = column_names(df)
        .into_iter()
        .filter(|name| name != label && !exclude.contains(&name.as_str()))
        .filter(|name| {
            df.column(name)
                .map(|c| c.dtype().is_primitive_numeric())
                .unwrap_or(false)
        })
        .collect();

    if features.is_empty() {
        return Err(PipelineError::Data(format!(
            "no numeric feature columns besides label '{}'",
            label
        )));
    }

    let x = FeatureMatrix::from_dataframe(df, &features)?;
    Ok((x, y))
}
