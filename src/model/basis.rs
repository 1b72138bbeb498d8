//! Regression basis strategies for the complexity covariate.
//!
//! All mixture components share one basis expansion; bases differ only in
//! how the complexity covariate is turned into regression features. The
//! covariate is standardized before expansion so that higher-order terms
//! stay well conditioned at single-cell complexity scales (thousands of
//! detected features).

use crate::error::{QcError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Basis family for the complexity-to-damage regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BasisType {
    /// Straight line in the complexity covariate.
    Linear,
    /// Polynomial of the given degree (>= 1).
    Polynomial { degree: usize },
    /// Truncated-power cubic spline with the given number of interior
    /// knots (>= 1), placed at quantiles of the observed complexity.
    Spline { knots: usize },
}

impl Default for BasisType {
    fn default() -> Self {
        Self::Linear
    }
}

impl BasisType {
    /// Validate the basis parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Linear => Ok(()),
            Self::Polynomial { degree } => {
                if *degree < 1 {
                    Err(QcError::InvalidParameter(
                        "polynomial degree must be at least 1".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
            Self::Spline { knots } => {
                if *knots < 1 {
                    Err(QcError::InvalidParameter(
                        "spline basis requires at least 1 interior knot".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Short name used in logs and result metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Polynomial { .. } => "polynomial",
            Self::Spline { .. } => "spline",
        }
    }
}

/// A basis fitted to observed complexity values.
///
/// Captures the standardization constants (and spline knots, when
/// applicable) so that new values expand into the same feature space the
/// model was fitted in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basis {
    kind: BasisType,
    center: f64,
    scale: f64,
    /// Interior knots in standardized covariate space (spline only).
    knots: Vec<f64>,
}

impl Basis {
    /// Fit a basis to the observed complexity values.
    pub fn fit(kind: &BasisType, complexity: &[f64]) -> Result<Self> {
        kind.validate()?;
        if complexity.is_empty() {
            return Err(QcError::EmptyData(
                "cannot fit a basis to zero records".to_string(),
            ));
        }

        let n = complexity.len() as f64;
        let center = complexity.iter().sum::<f64>() / n;
        let var = complexity.iter().map(|x| (x - center).powi(2)).sum::<f64>() / n;
        let scale = var.sqrt();
        if scale <= f64::EPSILON {
            return Err(QcError::Numerical(
                "complexity covariate is constant; regression basis is undefined".to_string(),
            ));
        }

        let knots = match kind {
            BasisType::Spline { knots } => {
                let mut sorted: Vec<f64> =
                    complexity.iter().map(|x| (x - center) / scale).collect();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let mut placed: Vec<f64> = Vec::with_capacity(*knots);
                for k in 1..=*knots {
                    let tau = k as f64 / (*knots as f64 + 1.0);
                    let idx = ((tau * (sorted.len() - 1) as f64).round() as usize)
                        .min(sorted.len() - 1);
                    let knot = sorted[idx];
                    // Coincident knots produce collinear columns.
                    if placed.last().map_or(true, |&last| knot > last) {
                        placed.push(knot);
                    }
                }
                placed
            }
            _ => Vec::new(),
        };

        Ok(Self {
            kind: kind.clone(),
            center,
            scale,
            knots,
        })
    }

    /// The basis family this expansion was built from.
    pub fn kind(&self) -> &BasisType {
        &self.kind
    }

    /// Number of regression coefficients (including the intercept).
    pub fn n_coefficients(&self) -> usize {
        match &self.kind {
            BasisType::Linear => 2,
            BasisType::Polynomial { degree } => degree + 1,
            BasisType::Spline { .. } => 4 + self.knots.len(),
        }
    }

    /// Expand a single complexity value into a basis row.
    pub fn row(&self, complexity: f64) -> DVector<f64> {
        let z = (complexity - self.center) / self.scale;
        let mut features = Vec::with_capacity(self.n_coefficients());
        match &self.kind {
            BasisType::Linear => {
                features.push(1.0);
                features.push(z);
            }
            BasisType::Polynomial { degree } => {
                let mut term = 1.0;
                for _ in 0..=*degree {
                    features.push(term);
                    term *= z;
                }
            }
            BasisType::Spline { .. } => {
                features.push(1.0);
                features.push(z);
                features.push(z * z);
                features.push(z * z * z);
                for &knot in &self.knots {
                    let t = (z - knot).max(0.0);
                    features.push(t * t * t);
                }
            }
        }
        DVector::from_vec(features)
    }

    /// Expand all complexity values into a design matrix (records x features).
    pub fn expand(&self, complexity: &[f64]) -> DMatrix<f64> {
        let p = self.n_coefficients();
        let mut design = DMatrix::zeros(complexity.len(), p);
        for (i, &x) in complexity.iter().enumerate() {
            let row = self.row(x);
            for j in 0..p {
                design[(i, j)] = row[j];
            }
        }
        design
    }
}
