//! Time series cross-validation

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One chronological train/validation split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Fold number, 0-based in chronological order
    pub fold: usize,
    /// Training rows
    pub train: Range<usize>,
    /// Validation rows, always directly after `train`
    pub validation: Range<usize>,
}

impl Fold {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }
}

/// Expanding-window time series splitter.
///
/// Rows are partitioned into `n_splits + 1` chronological segments of
/// `n_rows / (n_splits + 1)` rows. Fold `k` trains on every row before segment `k + 1`
/// and validates on segment `k + 1`. The `n_rows % (n_splits + 1)` remainder rows are
/// added to the first training window, so the last validation block ends at `n_rows`.
#[derive(Debug, Clone, Copy)]
pub struct ExpandingWindowSplit {
    n_splits: usize,
}

impl ExpandingWindowSplit {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Minimum number of rows needed to form every fold
    pub fn min_rows(&self) -> usize {
        self.n_splits + 1
    }

    /// Generate the folds for a dataset of `n_rows` rows
    pub fn split(&self, n_rows: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(PipelineError::invalid_parameter(
                "n_splits",
                self.n_splits,
                "must be at least 2",
            ));
        }
        if n_rows < self.min_rows() {
            return Err(PipelineError::InsufficientData {
                rows: n_rows,
                required: self.min_rows(),
            });
        }

        let segments = self.n_splits + 1;
        let test_size = n_rows / segments;
        let remainder = n_rows % segments;

        let folds = (0..self.n_splits)
            .map(|k| {
                let val_start = remainder + (k + 1) * test_size;
                Fold {
                    fold: k,
                    train: 0..val_start,
                    validation: val_start..val_start + test_size,
                }
            })
            .collect();

        Ok(folds)
    }
}
