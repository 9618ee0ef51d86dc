//! Regression models used by the scorer.
//!
//! The scorer only needs "fit on (X, y), then predict one row", so any learner
//! implementing [`Regressor`] can be swapped in.

pub mod forest;
pub mod tree;

use crate::domain::error::AdvisorError;
use crate::domain::features::N_FEATURES;

pub type FeatureVector = [f64; N_FEATURES];

pub trait Regressor: Send {
    fn fit(&mut self, x: &[FeatureVector], y: &[f64]) -> Result<(), AdvisorError>;

    /// Fails if called before a successful `fit`.
    fn predict(&self, x: &FeatureVector) -> Result<f64, AdvisorError>;

    fn name(&self) -> &str;
}

/// Per-column z-score standardization fitted on training rows.
///
/// Constant columns get a unit scale so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: FeatureVector,
    scales: FeatureVector,
}

impl Standardizer {
    pub fn fit(x: &[FeatureVector]) -> Self {
        let mut means = [0.0; N_FEATURES];
        let mut scales = [1.0; N_FEATURES];
        if x.is_empty() {
            return Self { means, scales };
        }

        let n = x.len() as f64;
        for col in 0..N_FEATURES {
            let mean = x.iter().map(|row| row[col]).sum::<f64>() / n;
            let variance = x
                .iter()
                .map(|row| {
                    let diff = row[col] - mean;
                    diff * diff
                })
                .sum::<f64>()
                / n;
            let std = variance.sqrt();

            means[col] = mean;
            scales[col] = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { means, scales }
    }

    pub fn transform(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; N_FEATURES];
        for col in 0..N_FEATURES {
            out[col] = (row[col] - self.means[col]) / self.scales[col];
        }
        out
    }

    pub fn transform_all(&self, x: &[FeatureVector]) -> Vec<FeatureVector> {
        x.iter().map(|row| self.transform(row)).collect()
    }
}

pub(crate) fn check_training_shape(x: &[FeatureVector], y: &[f64]) -> Result<(), AdvisorError> {
    if x.is_empty() {
        return Err(AdvisorError::Model {
            reason: "cannot fit on an empty training set".into(),
        });
    }
    if x.len() != y.len() {
        return Err(AdvisorError::Model {
            reason: format!("{} feature rows but {} targets", x.len(), y.len()),
        });
    }
    if y.iter().chain(x.iter().flatten()).any(|v| !v.is_finite()) {
        return Err(AdvisorError::Model {
            reason: "training data contains non-finite values".into(),
        });
    }
    Ok(())
}
