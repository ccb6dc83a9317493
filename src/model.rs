//! Return-risk classifier: train/test split, standardization, class-balanced
//! logistic regression and evaluation

use linfa::traits::Fit;
use linfa::{Dataset, DatasetBase};
use ndarray::{s, Array1, Array2, ArrayView1, Axis, Ix1};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::aggregate::SkuRiskFeature;
use crate::dimensions::KnownKeys;
use crate::export::TableRow;

/// Model input columns, in matrix order
pub const FEATURE_NAMES: [&str; 4] = ["Discount", "Quantity", "NetProfit", "NetRevenue"];

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Training labels contain a single class ({0}); both classes are required")]
    SingleClass(usize),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Logistic regression did not converge after {0} iterations")]
    ConvergenceFailed(usize),

    #[error("Hessian is singular; features are degenerate")]
    SingularHessian,

    #[error(transparent)]
    Linfa(#[from] linfa::Error),
}

/// Build X = [Discount, Quantity, NetProfit, NetRevenue] and y = HighReturnRisk
pub fn feature_matrix(features: &[SkuRiskFeature]) -> (Array2<f64>, Array1<usize>) {
    let mut x = Array2::zeros((features.len(), FEATURE_NAMES.len()));
    for (mut row, f) in x.outer_iter_mut().zip(features) {
        row[0] = f.discount;
        row[1] = f.quantity as f64;
        row[2] = f.net_profit;
        row[3] = f.net_revenue;
    }

    let y = features.iter().map(|f| usize::from(f.high_return_risk)).collect();
    (x, y)
}

/// Row positions of a shuffled train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Permute `0..n` and hold out the first `ceil(test_size * n)` positions
pub fn train_test_split<R: Rng>(n: usize, test_size: f64, rng: &mut R) -> SplitIndices {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let n_test = ((n as f64) * test_size).ceil().min(n as f64) as usize;
    let train = indices.split_off(n_test);

    SplitIndices { train, test: indices }
}

/// Per-column zero-mean, unit-variance scaling
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `x`. Constant columns scale by 1.
    pub fn fit(x: &Array2<f64>) -> Self {
        let n_features = x.ncols();
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let std = if x.nrows() == 0 {
            Array1::ones(n_features)
        } else {
            x.std_axis(Axis(0), 0.0)
                .mapv(|s| if s > f64::EPSILON { s } else { 1.0 })
        };

        Self { mean, std }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                got: x.ncols(),
            });
        }
        Ok((x - &self.mean) / &self.std)
    }
}

/// Hyperparameters of the binary logistic regression
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegressionParams {
    /// Inverse L2 regularization strength
    pub c: f64,
    /// Newton iteration cap; hitting it is an error
    pub max_iter: usize,
    /// Converged once every gradient component is below this
    pub tolerance: f64,
    /// Weight samples by `n / (2 * n_class)`
    pub balanced: bool,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tolerance: 1e-8,
            balanced: true,
        }
    }
}

/// Fitted logistic regression
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    pub n_iter: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let exp_z = z.exp();
        exp_z / (1.0 + exp_z)
    }
}

/// ln(1 + e^z) without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Weighted, L2-penalized mean log loss over the parameter vector
/// `[coefficients..., intercept]`. The intercept is not penalized.
struct Objective<'a> {
    x: &'a Array2<f64>,
    y: Array1<f64>,
    weights: Array1<f64>,
    l2: f64,
}

impl<'a> Objective<'a> {
    fn new(x: &'a Array2<f64>, labels: &Array1<usize>, params: &LogisticRegressionParams) -> Self {
        let n_samples = labels.len();
        let positives = labels.iter().filter(|&&l| l == 1).count();
        let y = labels.mapv(|l| if l == 1 { 1.0 } else { 0.0 });
        let weights = if params.balanced {
            let n = n_samples as f64;
            let w_pos = n / (2.0 * positives as f64);
            let w_neg = n / (2.0 * (n_samples - positives) as f64);
            y.mapv(|t| if t == 1.0 { w_pos } else { w_neg })
        } else {
            Array1::ones(n_samples)
        };

        Self {
            x,
            y,
            weights,
            l2: 1.0 / (params.c * n_samples as f64),
        }
    }

    fn n(&self) -> f64 {
        self.y.len() as f64
    }

    fn split<'b>(&self, beta: &'b Array1<f64>) -> (ArrayView1<'b, f64>, f64) {
        let d = self.x.ncols();
        (beta.slice(s![..d]), beta[d])
    }

    fn linear(&self, beta: &Array1<f64>) -> Array1<f64> {
        let (coef, intercept) = self.split(beta);
        self.x.dot(&coef) + intercept
    }

    fn value(&self, beta: &Array1<f64>) -> f64 {
        let (coef, _) = self.split(beta);
        let z = self.linear(beta);
        let loss: f64 = z
            .iter()
            .zip(self.y.iter())
            .zip(self.weights.iter())
            .map(|((&z, &t), &w)| w * (softplus(z) - t * z))
            .sum();
        loss / self.n() + 0.5 * self.l2 * coef.dot(&coef)
    }

    fn gradient(&self, beta: &Array1<f64>) -> Array1<f64> {
        let (coef, _) = self.split(beta);
        let p = self.linear(beta).mapv(sigmoid);
        let residual = (&p - &self.y) * &self.weights / self.n();

        let mut grad = Array1::<f64>::zeros(beta.len());
        let d = self.x.ncols();
        grad.slice_mut(s![..d])
            .assign(&(self.x.t().dot(&residual) + &coef * self.l2));
        grad[d] = residual.sum();
        grad
    }

    fn hessian(&self, beta: &Array1<f64>) -> Array2<f64> {
        let d = self.x.ncols();
        let p = self.linear(beta).mapv(sigmoid);
        let r = p.mapv(|p| p * (1.0 - p)) * &self.weights / self.n();
        let xr = self.x * &r.view().insert_axis(Axis(1));

        let mut h = Array2::<f64>::zeros((d + 1, d + 1));
        h.slice_mut(s![..d, ..d]).assign(&self.x.t().dot(&xr));
        let cross = xr.sum_axis(Axis(0));
        h.slice_mut(s![..d, d]).assign(&cross);
        h.slice_mut(s![d, ..d]).assign(&cross);
        h[[d, d]] = r.sum();
        for i in 0..d {
            h[[i, i]] += self.l2;
        }
        h
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` when `a` is singular.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-300 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

impl Fit<Array2<f64>, Array1<usize>, ModelError> for LogisticRegressionParams {
    type Object = LogisticRegression;

    /// Damped Newton iterations from zero weights, so fitting is deterministic.
    /// Fails with `ConvergenceFailed` instead of returning an unconverged model.
    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<usize>>) -> Result<LogisticRegression, ModelError> {
        let x = dataset.records();
        let labels = dataset.targets();

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if labels.len() != n_samples {
            return Err(ModelError::DimensionMismatch {
                expected: n_samples,
                got: labels.len(),
            });
        }

        let positives = labels.iter().filter(|&&l| l == 1).count();
        if positives == 0 || positives == n_samples {
            return Err(ModelError::SingleClass(usize::from(positives > 0)));
        }

        let objective = Objective::new(x, labels, self);
        let d = x.ncols();
        let mut beta = Array1::<f64>::zeros(d + 1);

        for iter in 0..=self.max_iter {
            let grad = objective.gradient(&beta);
            let grad_norm = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if !grad_norm.is_finite() {
                break;
            }
            if grad_norm < self.tolerance {
                log::debug!("logistic regression converged at iteration {} (|grad| {:.3e})", iter, grad_norm);
                return Ok(LogisticRegression {
                    coefficients: beta.slice(s![..d]).to_owned(),
                    intercept: beta[d],
                    n_iter: iter,
                });
            }
            if iter == self.max_iter {
                break;
            }

            let step = solve(objective.hessian(&beta), grad).ok_or(ModelError::SingularHessian)?;

            // Halve the step until the objective stops increasing
            let current = objective.value(&beta);
            let mut scale = 1.0;
            loop {
                let candidate = &beta - &(&step * scale);
                if objective.value(&candidate) <= current || scale < 1e-10 {
                    beta = candidate;
                    break;
                }
                scale *= 0.5;
            }
        }

        log::warn!("logistic regression did not converge within {} iterations", self.max_iter);
        Err(ModelError::ConvergenceFailed(self.max_iter))
    }
}

impl LogisticRegression {
    /// Probability of the positive class for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.coefficients.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: x.ncols(),
            });
        }
        Ok((x.dot(&self.coefficients) + self.intercept).mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>, ModelError> {
        Ok(self.predict_proba(x)?.mapv(|p| usize::from(p > 0.5)))
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class evaluation of held-out predictions
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Evaluate over every label present in either the truth or the predictions
    pub fn new(y_true: &[usize], y_pred: &[usize]) -> Self {
        let mut labels: Vec<usize> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let pairs: Vec<(usize, usize)> = y_true.iter().copied().zip(y_pred.iter().copied()).collect();

        let classes = labels
            .into_iter()
            .map(|class| {
                let tp = pairs.iter().filter(|&&(t, p)| t == class && p == class).count();
                let predicted = pairs.iter().filter(|&&(_, p)| p == class).count();
                let support = pairs.iter().filter(|&&(t, _)| t == class).count();

                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };

                ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let correct = pairs.iter().filter(|(t, p)| t == p).count();

        Self {
            classes,
            accuracy: ratio(correct, pairs.len()),
            support: pairs.len(),
        }
    }

    fn macro_average(&self) -> (f64, f64, f64) {
        let n = self.classes.len().max(1) as f64;
        let sum = |f: fn(&ClassMetrics) -> f64| self.classes.iter().map(f).sum::<f64>() / n;
        (sum(|c| c.precision), sum(|c| c.recall), sum(|c| c.f1))
    }

    fn weighted_average(&self) -> (f64, f64, f64) {
        let total = self.support.max(1) as f64;
        let sum = |f: fn(&ClassMetrics) -> f64| {
            self.classes
                .iter()
                .map(|c| f(c) * c.support as f64)
                .sum::<f64>()
                / total
        };
        (sum(|c| c.precision), sum(|c| c.recall), sum(|c| c.f1))
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.class, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>12} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support)?;

        let (p, r, f1) = self.macro_average();
        writeln!(f, "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}", "macro avg", p, r, f1, self.support)?;
        let (p, r, f1) = self.weighted_average();
        writeln!(f, "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}", "weighted avg", p, r, f1, self.support)
    }
}

/// Held-out return-risk probability of one SKU
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RiskPrediction {
    pub stock_code: String,
    pub return_rate: f64,
    pub return_risk_probability: f64,
}

impl TableRow for RiskPrediction {
    const COLUMNS: &'static [&'static str] = &["StockCode", "ReturnRate", "ReturnRiskProbability"];
}

/// Everything the modeling stage produces
#[derive(Debug, Clone)]
pub struct RiskModelOutput {
    pub model: LogisticRegression,
    pub scaler: StandardScaler,
    pub split: SplitIndices,
    /// Known-product predictions, highest probability first
    pub predictions: Vec<RiskPrediction>,
    pub report: ClassificationReport,
}

/// Train on a seeded split of the SKU features and score the held-out SKUs
///
/// # Arguments
/// * `features` - SKU rows as read back from the feature export
/// * `known` - Dimension keys; predictions for unknown products are dropped
/// * `test_size` - Held-out fraction
/// * `rng` - The seeded split stream
pub fn run_risk_model<R: Rng>(
    features: &[SkuRiskFeature],
    known: &KnownKeys,
    test_size: f64,
    params: &LogisticRegressionParams,
    rng: &mut R,
) -> Result<RiskModelOutput, ModelError> {
    let (x, y) = feature_matrix(features);
    let split = train_test_split(features.len(), test_size, rng);

    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);
    let y_train = y.select(Axis(0), &split.train);
    let y_test = y.select(Axis(0), &split.test);

    let scaler = StandardScaler::fit(&x_train);
    let x_train = scaler.transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    let train: Dataset<f64, usize, Ix1> = Dataset::new(x_train, y_train);
    let model = params.fit(&train)?;

    log::info!(
        "fitted logistic regression on {} SKUs in {} iterations (intercept {:.4}, coefficients {:?})",
        split.train.len(),
        model.n_iter,
        model.intercept,
        model.coefficients.to_vec()
    );

    let probabilities = model.predict_proba(&x_test)?;
    let predicted = model.predict(&x_test)?;
    let report = ClassificationReport::new(y_test.as_slice().unwrap_or(&[]), &predicted.to_vec());

    let mut predictions: Vec<RiskPrediction> = split
        .test
        .iter()
        .zip(probabilities.iter())
        .map(|(&row, &probability)| RiskPrediction {
            stock_code: features[row].stock_code.clone(),
            return_rate: features[row].return_rate,
            return_risk_probability: probability,
        })
        .filter(|p| known.has_product(&p.stock_code))
        .collect();
    predictions.sort_by(|a, b| b.return_risk_probability.total_cmp(&a.return_risk_probability));

    Ok(RiskModelOutput {
        model,
        scaler,
        split,
        predictions,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, Stage};

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_vec(
            (6, 2),
            vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 5.0, 5.0, 5.5, 5.5, 6.0, 6.0],
        )
        .unwrap();
        (x, Array1::from_vec(vec![0, 0, 0, 1, 1, 1]))
    }

    fn sku(stock: &str, quantity: i64, return_rate: f64) -> SkuRiskFeature {
        SkuRiskFeature {
            stock_code: stock.to_string(),
            discount: 0.1,
            return_rate,
            quantity,
            net_profit: quantity as f64 * 0.2,
            net_revenue: quantity as f64 * 0.9,
            high_return_risk: u8::from(return_rate > 0.5),
        }
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(100.0) > 0.99);
        assert!(sigmoid(-100.0) < 0.01);
    }

    #[test]
    fn test_split_sizes_and_reproducibility() {
        let bank = RngBank::new(42);
        let split = train_test_split(11, 0.2, &mut bank.for_stage(Stage::ModelSplit));
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());

        let again = train_test_split(11, 0.2, &mut bank.for_stage(Stage::ModelSplit));
        assert_eq!(split, again);
    }

    #[test]
    fn test_scaler_fit_transform() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0]).unwrap();
        let scaler = StandardScaler::fit(&x);
        let scaled = scaler.transform(&x).unwrap();

        assert!((scaled.column(0).sum()).abs() < 1e-12);
        let var = scaled.column(0).mapv(|v| v * v).sum() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);
        // Constant column maps to zero rather than NaN
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));

        let wrong = Array2::zeros((1, 3));
        assert!(scaler.transform(&wrong).is_err());
    }

    #[test]
    fn test_fit_separable() {
        let (x, y) = separable();
        let x = StandardScaler::fit(&x).transform(&x).unwrap();
        let dataset: Dataset<f64, usize, Ix1> = Dataset::new(x.clone(), y.clone());
        let params = LogisticRegressionParams::default();

        let model = params.fit(&dataset).unwrap();
        let predicted = model.predict(&x).unwrap();

        let correct = predicted.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 5);

        let again = params.fit(&dataset).unwrap();
        assert_eq!(model, again);
    }

    /// Two hundred SKUs with overlapping classes, on the scale of a real export
    fn retail_skus() -> Vec<SkuRiskFeature> {
        let mut rng = RngBank::new(7).for_stage(Stage::ModelSplit);
        (0..200)
            .map(|i| {
                let quantity = rng.gen_range(1..2000_i64);
                let price = rng.gen_range(0.2..15.0);
                let discount = rng.gen_range(0.0..0.2);
                let net_revenue = quantity as f64 * price * (1.0 - discount);
                let net_profit = net_revenue - quantity as f64 * price * 0.7;
                let logit = 1.5 - 0.004 * quantity as f64 + 6.0 * discount + rng.gen_range(-1.5..1.5);
                let high_risk = rng.gen::<f64>() < sigmoid(logit);
                SkuRiskFeature {
                    stock_code: format!("{:05}", i),
                    discount,
                    return_rate: if high_risk { 0.7 } else { 0.1 },
                    quantity,
                    net_profit,
                    net_revenue,
                    high_return_risk: u8::from(high_risk),
                }
            })
            .collect()
    }

    #[test]
    fn test_fit_reaches_stationary_point() {
        let (x, y) = feature_matrix(&retail_skus());
        let positives = y.iter().filter(|&&l| l == 1).count();
        assert!(positives > 20 && positives < 180);

        let x = StandardScaler::fit(&x).transform(&x).unwrap();
        let dataset: Dataset<f64, usize, Ix1> = Dataset::new(x.clone(), y.clone());
        let params = LogisticRegressionParams::default();

        let model = params.fit(&dataset).unwrap();
        assert!(model.n_iter < params.max_iter);

        let mut beta = model.coefficients.to_vec();
        beta.push(model.intercept);
        let grad = Objective::new(&x, &y, &params).gradient(&Array1::from_vec(beta));
        assert!(grad.iter().all(|g| g.abs() < 1e-8), "gradient {:?}", grad);
    }

    #[test]
    fn test_fit_reports_iteration_cap() {
        let (x, y) = feature_matrix(&retail_skus());
        let x = StandardScaler::fit(&x).transform(&x).unwrap();
        let dataset: Dataset<f64, usize, Ix1> = Dataset::new(x, y);
        let params = LogisticRegressionParams {
            max_iter: 1,
            ..LogisticRegressionParams::default()
        };

        let result = params.fit(&dataset);
        assert!(matches!(result, Err(ModelError::ConvergenceFailed(1))));
    }

    #[test]
    fn test_solve_with_pivoting() {
        let a = Array2::from_shape_vec((3, 3), vec![0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0]).unwrap();
        let b = Array1::from_vec(vec![7.0, 3.0, 6.0]);
        let x = solve(a, b).unwrap();
        for (got, want) in x.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-12);
        }

        assert!(solve(Array2::zeros((2, 2)), Array1::ones(2)).is_none());
    }

    #[test]
    fn test_fit_rejects_single_class() {
        let (x, _) = separable();
        let dataset: Dataset<f64, usize, Ix1> = Dataset::new(x, Array1::zeros(6));
        let result = LogisticRegressionParams::default().fit(&dataset);
        assert!(matches!(result, Err(ModelError::SingleClass(0))));
    }

    #[test]
    fn test_fit_rejects_empty() {
        let dataset: Dataset<f64, usize, Ix1> = Dataset::new(Array2::zeros((0, 4)), Array1::zeros(0));
        let result = LogisticRegressionParams::default().fit(&dataset);
        assert!(matches!(result, Err(ModelError::EmptyTrainingSet)));
    }

    #[test]
    fn test_classification_report() {
        let report = ClassificationReport::new(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        assert_eq!(report.classes.len(), 2);

        let zero = &report.classes[0];
        assert_eq!(zero.precision, 1.0);
        assert_eq!(zero.recall, 0.5);
        assert_eq!(zero.support, 2);

        let one = &report.classes[1];
        assert!((one.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(one.recall, 1.0);
        assert!((one.f1 - 0.8).abs() < 1e-12);
        assert_eq!(report.accuracy, 0.75);

        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_run_risk_model_sorted_and_known() {
        let mut features = Vec::new();
        for i in 0..10 {
            features.push(sku(&format!("L{}", i), 100 + i * 10, 0.1));
            features.push(sku(&format!("H{}", i), 5 + i, 0.8));
        }

        let products: Vec<crate::dimensions::Product> = features
            .iter()
            .filter(|f| f.stock_code != "H0")
            .map(|f| crate::dimensions::Product {
                stock_code: f.stock_code.clone(),
                description: "ITEM".to_string(),
                unit_price: 1.0,
                category: "Home".to_string(),
            })
            .collect();
        let known = KnownKeys::new(&products, &[]);

        let mut rng = RngBank::new(42).for_stage(Stage::ModelSplit);
        let output = run_risk_model(&features, &known, 0.2, &LogisticRegressionParams::default(), &mut rng).unwrap();

        assert_eq!(output.split.test.len(), 4);
        assert!(output.predictions.len() <= 4);
        assert!(output.predictions.iter().all(|p| p.stock_code != "H0"));
        assert!(output
            .predictions
            .windows(2)
            .all(|w| w[0].return_risk_probability >= w[1].return_risk_probability));
        assert!(output
            .predictions
            .iter()
            .all(|p| (0.0..=1.0).contains(&p.return_risk_probability)));
        assert_eq!(output.report.support, 4);
    }
}
