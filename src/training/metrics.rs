//! Regression metrics

use crate::error::{PipelineError, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Mean absolute error between two equally long vectors
pub fn mean_absolute_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum();
    Ok(total / y_true.len() as f64)
}

fn check_lengths(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(PipelineError::Data("cannot score an empty prediction set".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::Data(format!(
            "{} labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Regression metrics for a fitted model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Mean cross-validated MAE of the selected trial, when a search ran
    pub cv_mae: Option<f64>,
    /// Training time in seconds
    pub training_time_secs: f64,
    /// Number of features
    pub n_features: usize,
    /// Number of training samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_mae() {
        let t = array![1.0, 2.0, 3.0, 4.0];
        let p = array![1.5, 2.0, 2.0, 4.0];
        assert_relative_eq!(mean_absolute_error(t.view(), p.view()).unwrap(), 0.375);
    }

    #[test]
    fn test_mae_rejects_bad_input() {
        let t = array![1.0, 2.0];
        let p = array![1.0];
        assert!(mean_absolute_error(t.view(), p.view()).is_err());
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert!(mean_absolute_error(empty.view(), empty.view()).is_err());
    }

    #[test]
    fn test_regression_metrics() {
        let t = array![1.0, 2.0, 3.0, 4.0];
        let p = array![1.0, 2.0, 3.0, 5.0];
        let m = ModelMetrics::compute_regression(t.view(), p.view()).unwrap();
        assert_relative_eq!(m.mse, 0.25);
        assert_relative_eq!(m.rmse, 0.5);
        assert_relative_eq!(m.mae, 0.25);
        assert_relative_eq!(m.r2, 1.0 - 1.0 / 5.0);
        assert_eq!(m.n_samples, 4);
    }
}
