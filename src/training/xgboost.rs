//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Built-in L1 (alpha) and L2 (lambda) regularization
//! - Minimum child weight constraint

use crate::error::{PipelineError, Result};
use crate::optimizer::HyperparameterSet;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Loss minimised by the booster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Squared error, grad = pred - y, hess = 1
    #[default]
    SquaredError,
    /// Absolute error, grad = sign(pred - y), leaves refreshed to residual medians
    AbsoluteError,
}

/// XGBoost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub objective: Objective,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            objective: Objective::SquaredError,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
    /// Overlay sampled hyperparameters onto this configuration
    pub fn with_params(mut self, params: &HyperparameterSet) -> Result<Self> {
        for (name, value) in params {
            let float = || {
                value.as_float().ok_or_else(|| {
                    PipelineError::invalid_parameter(name.clone(), value, "expected a number")
                })
            };
            let int = || {
                value
                    .as_int()
                    .filter(|v| *v >= 0)
                    .map(|v| v as usize)
                    .ok_or_else(|| {
                        PipelineError::invalid_parameter(
                            name.clone(),
                            value,
                            "expected a non-negative integer",
                        )
                    })
            };
            match name.as_str() {
                "n_estimators" => self.n_estimators = int()?,
                "max_depth" => self.max_depth = int()?,
                "learning_rate" => self.learning_rate = float()?,
                "subsample" => self.subsample = float()?,
                "colsample_bytree" => self.colsample_bytree = float()?,
                "min_child_weight" => self.min_child_weight = float()?,
                "reg_lambda" => self.reg_lambda = float()?,
                "reg_alpha" => self.reg_alpha = float()?,
                "gamma" => self.gamma = float()?,
                _ => {
                    return Err(PipelineError::invalid_parameter(
                        name.clone(),
                        value,
                        "not an XGBoost hyperparameter",
                    ))
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::invalid_parameter(
                "n_estimators",
                self.n_estimators,
                "must be at least 1",
            ));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::invalid_parameter("max_depth", self.max_depth, "must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(PipelineError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::invalid_parameter(name, ratio, "must lie in (0, 1]"));
            }
        }
        Ok(())
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    /// Reset every leaf to the median residual of the rows routed to it
    fn refresh_leaves(&mut self, x: &ArrayView2<f64>, residual: &Array1<f64>, indices: &[usize]) {
        match self {
            XGBNode::Leaf { weight } => {
                if let Some(m) = median(indices.iter().map(|&i| residual[i]).collect()) {
                    *weight = m;
                }
            }
            XGBNode::Split { feature, threshold, left, right } => {
                let (l, r): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, *feature]] <= *threshold);
                left.refresh_leaves(x, residual, &l);
                right.refresh_leaves(x, residual, &r);
            }
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &ArrayView2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // collected in feature order so ties resolve to the lowest feature index
    let candidates: Vec<(usize, f64, f64)> = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .collect();
    let best_split = candidates
        .into_iter()
        .fold(None, |best: Option<(usize, f64, f64)>, cand| match best {
            Some(b) if b.2 >= cand.2 => Some(b),
            _ => Some(cand),
        });

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Best `(feature, threshold, gain)` for a single feature using the exact greedy method
fn find_best_split_for_feature(
    x: &ArrayView2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    let lambda = config.reg_lambda;

    for (pos, &idx) in sorted_indices.iter().enumerate().take(sorted_indices.len().saturating_sub(1)) {
        g_left += grad[idx];
        h_left += hess[idx];

        let next_idx = sorted_indices[pos + 1];
        // no split between identical values
        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |(_, g)| gain > g) {
            let threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
            best = Some((threshold, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

// ─── XGBoost Regressor ─────────────────────────────────────────────────────

/// XGBoost Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        self.config.validate()?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 || n_features == 0 {
            return Err(PipelineError::Training(format!(
                "cannot fit on an empty matrix ({} x {})",
                n_samples, n_features
            )));
        }
        if y.len() != n_samples {
            return Err(PipelineError::Training(format!(
                "feature rows ({}) and labels ({}) differ in length",
                n_samples,
                y.len()
            )));
        }
        if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Training(format!(
                "non-finite feature value at row {}, column {}",
                pos / n_features,
                pos % n_features
            )));
        }
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Training(format!("non-finite label at row {}", row)));
        }

        let objective = self.config.objective;
        self.base_score = match objective {
            Objective::SquaredError => y.mean().unwrap_or(0.0),
            Objective::AbsoluteError => median(y.to_vec()).unwrap_or(0.0),
        };
        let mut preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let hess = Array1::from_elem(n_samples, 1.0);

        for _ in 0..self.config.n_estimators {
            let residual: Array1<f64> = &preds - &y;
            let grad = match objective {
                Objective::SquaredError => residual.clone(),
                Objective::AbsoluteError => residual.mapv(|r| {
                    if r > 0.0 {
                        1.0
                    } else if r < 0.0 {
                        -1.0
                    } else {
                        0.0
                    }
                }),
            };

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let mut tree = build_xgb_tree(&x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);
            if objective == Objective::AbsoluteError {
                let target: Array1<f64> = -residual;
                tree.refresh_leaves(&x, &target, &row_indices);
            }

            for (i, row) in x.rows().into_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }

            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::Data(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Data(format!(
                "non-finite feature value at row {}, column {}",
                pos / self.n_features,
                pos % self.n_features
            )));
        }
        let preds = x
            .rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|tree| self.config.learning_rate * tree.predict(row))
                        .sum::<f64>()
            })
            .collect();
        Ok(preds)
    }

    /// Compute feature importances by counting splits across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        Some(xgb_tree_importances(&self.trees, self.n_features))
    }
}

/// Split-count importances, normalised to sum to one
fn xgb_tree_importances(trees: &[XGBNode], n_features: usize) -> Array1<f64> {
    let mut counts = vec![0.0f64; n_features];
    for tree in trees {
        xgb_count_splits(tree, &mut counts);
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
    }
    Array1::from_vec(counts)
}

fn xgb_count_splits(node: &XGBNode, counts: &mut [f64]) {
    match node {
        XGBNode::Leaf { .. } => {}
        XGBNode::Split { feature, left, right, .. } => {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            xgb_count_splits(left, counts);
            xgb_count_splits(right, counts);
        }
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;
    use ndarray::Array2;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x.rows().into_iter().map(|r| r[0] * 2.0 + r[1] * 0.5 + 1.0).collect();
        (x, y)
    }

    fn mae(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        (a - b).mapv(f64::abs).mean().unwrap()
    }

    #[test]
    fn test_xgboost_regressor() {
        let (x, y) = regression_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        let preds = model.predict(x.view()).unwrap();
        assert_eq!(preds.len(), 50);
        assert!(mae(&preds, &y) < 0.5, "MAE = {}", mae(&preds, &y));
    }

    #[test]
    fn test_absolute_error_objective() {
        let (x, mut y) = regression_data();
        // a single outlier should not drag the fit
        y[10] += 500.0;
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 60,
            max_depth: 4,
            objective: Objective::AbsoluteError,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        let preds = model.predict(x.view()).unwrap();
        let (_, clean) = regression_data();
        let errors: Vec<f64> = (0..50).filter(|&i| i != 10).map(|i| (preds[i] - clean[i]).abs()).collect();
        let mean = errors.iter().sum::<f64>() / errors.len() as f64;
        assert!(mean < 1.5, "mean error on clean rows = {}", mean);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = regression_data();
        let config = XGBoostConfig {
            n_estimators: 20,
            subsample: 0.7,
            colsample_bytree: 0.5,
            random_state: Some(7),
            ..Default::default()
        };
        let mut a = XGBoostRegressor::new(config.clone());
        let mut b = XGBoostRegressor::new(config);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.predict(x.view()).unwrap(), b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_xgboost_regularization() {
        let (x, y) = regression_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 30,
            reg_lambda: 10.0,
            reg_alpha: 1.0,
            gamma: 1.0,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        let preds = model.predict(x.view()).unwrap();
        assert_eq!(preds.len(), 50);
        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let (mut x, y) = regression_data();
        x[[3, 1]] = f64::NAN;
        let mut model = XGBoostRegressor::new(XGBoostConfig::default());
        match model.fit(x.view(), y.view()) {
            Err(PipelineError::Training(msg)) => assert!(msg.contains("row 3")),
            other => panic!("expected training error, got {:?}", other),
        }
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = regression_data();
        let model = XGBoostRegressor::new(XGBoostConfig::default());
        assert!(matches!(model.predict(x.view()), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_predict_rejects_missing_features() {
        let (x, y) = regression_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();

        let mut missing = x.clone();
        missing[[2, 1]] = f64::NAN;
        match model.predict(missing.view()) {
            Err(PipelineError::Data(msg)) => assert!(msg.contains("row 2, column 1"), "{}", msg),
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_with_params() {
        let mut params = HyperparameterSet::new();
        params.insert("n_estimators".to_string(), ParameterValue::Int(250));
        params.insert("learning_rate".to_string(), ParameterValue::Float(0.05));
        let config = XGBoostConfig::default().with_params(&params).unwrap();
        assert_eq!(config.n_estimators, 250);
        assert_eq!(config.learning_rate, 0.05);

        params.insert("booster".to_string(), ParameterValue::String("dart".to_string()));
        assert!(XGBoostConfig::default().with_params(&params).is_err());
    }
}
