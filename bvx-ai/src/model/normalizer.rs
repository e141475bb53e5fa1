//! Per-feature z-score normalization
//!
//! Fitted once on the training split and applied unchanged at inference.

use crate::error::{DetectError, Result};
use crate::features::stats;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fitted mean/std per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    mean: Vec<f64>,
    /// Divisor per feature; 1.0 for features constant in training
    scale: Vec<f64>,
    /// Indices of features with zero spread in training
    constant: Vec<usize>,
}

impl Normalizer {
    /// Fit on a design matrix (one row per sample)
    ///
    /// # Errors
    /// `DetectError::Configuration` on an empty matrix or ragged rows.
    pub fn fit(matrix: &[Vec<f64>]) -> Result<Self> {
        let n_features = matrix
            .first()
            .map(Vec::len)
            .ok_or_else(|| DetectError::Configuration("Cannot fit on empty matrix".to_string()))?;

        if let Some(row) = matrix.iter().position(|r| r.len() != n_features) {
            return Err(DetectError::Configuration(format!(
                "Row {} has {} features, expected {}",
                row,
                matrix[row].len(),
                n_features
            )));
        }

        let mut mean = Vec::with_capacity(n_features);
        let mut scale = Vec::with_capacity(n_features);
        let mut constant = Vec::new();

        for j in 0..n_features {
            let column: Vec<f64> = matrix.iter().map(|row| row[j]).collect();
            let (m, s) = stats::mean_std(&column);
            mean.push(m);
            if s > 0.0 && s.is_finite() {
                scale.push(s);
            } else {
                constant.push(j);
                scale.push(1.0);
            }
        }

        if !constant.is_empty() {
            warn!(
                constant_features = ?constant,
                "Features constant in training data, scaled by 1"
            );
        }

        Ok(Self {
            mean,
            scale,
            constant,
        })
    }

    /// Fitted dimensionality
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Indices of features that had zero spread during fitting
    pub fn constant_features(&self) -> &[usize] {
        &self.constant
    }

    /// Check a deserialized normalizer
    ///
    /// # Errors
    /// `DetectError::Artifact` if `mean` and `scale` differ in length, a
    /// value is non-finite, a scale is not positive, or a constant index is
    /// out of range.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.mean.is_empty() {
            return Err(DetectError::Artifact("Normalizer has no features".to_string()));
        }
        if self.scale.len() != self.mean.len() {
            return Err(DetectError::Artifact(format!(
                "Normalizer has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(j) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(DetectError::Artifact(format!("Normalizer mean {} is not finite", j)));
        }
        if let Some(j) = self.scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(DetectError::Artifact(format!(
                "Normalizer scale {} is {}, expected a positive finite value",
                j, self.scale[j]
            )));
        }
        if let Some(&j) = self.constant.iter().find(|&&j| j >= self.mean.len()) {
            return Err(DetectError::Artifact(format!(
                "Normalizer constant feature index {} out of range",
                j
            )));
        }
        Ok(())
    }

    /// Normalize one vector
    ///
    /// # Errors
    /// `DetectError::Configuration` if `values.len()` differs from the
    /// fitted dimensionality.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.n_features() {
            return Err(DetectError::Configuration(format!(
                "Feature vector has {} values, normalizer was fitted on {}",
                values.len(),
                self.n_features()
            )));
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect())
    }

    /// Normalize every row of a matrix
    pub fn transform_matrix(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        matrix.iter().map(|row| self.transform(row)).collect()
    }
}
