//! Two-component mixture regression model types.

use crate::error::{QcError, Result};
use crate::model::basis::{Basis, BasisType};
use serde::{Deserialize, Serialize};

/// Mixing weights below this floor mark the fit as degenerate.
pub(crate) const MIN_WEIGHT: f64 = 1e-3;

/// Residual variances below this floor mark a component as collapsed.
pub(crate) const MIN_VARIANCE: f64 = 1e-10;

/// Grid resolution used when comparing the two fitted curves.
const CURVE_GRID: usize = 50;

/// Fraction of the pooled residual sd below which the mean curve gap
/// counts as indistinguishable.
const SEPARATION_FRACTION: f64 = 0.05;

/// One component of the mixture: a regression curve over the shared basis,
/// a residual variance, and a mixing weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureComponent {
    /// Regression coefficients over the fitted basis.
    pub coefficients: Vec<f64>,
    /// Residual variance of the damage metric around the curve.
    pub variance: f64,
    /// Mixing weight (prior probability of membership).
    pub weight: f64,
}

impl MixtureComponent {
    /// Expected damage at the given complexity value.
    pub fn predict_at(&self, basis: &Basis, complexity: f64) -> f64 {
        let row = basis.row(complexity);
        row.iter()
            .zip(&self.coefficients)
            .map(|(x, b)| x * b)
            .sum()
    }
}

/// A fitted two-component mixture regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureModel {
    /// The two components, in the fitter's arbitrary order.
    pub components: [MixtureComponent; 2],
    /// Basis the coefficients are expressed in.
    pub basis: Basis,
    /// Total log-likelihood at the final iteration.
    pub log_likelihood: f64,
    /// EM iterations run.
    pub iterations: usize,
    /// Whether the log-likelihood change fell below tolerance before the
    /// iteration bound.
    pub converged: bool,
    /// Seed of the restart that produced this fit.
    pub restart_seed: u64,
}

impl MixtureModel {
    /// Expected damage for component `k` across the given complexity values.
    pub fn predict(&self, k: usize, complexity: &[f64]) -> Vec<f64> {
        complexity
            .iter()
            .map(|&x| self.components[k].predict_at(&self.basis, x))
            .collect()
    }

    /// Pooled residual standard deviation across both components.
    pub fn pooled_sd(&self) -> f64 {
        let [a, b] = &self.components;
        (a.weight * a.variance + b.weight * b.variance).sqrt()
    }

    /// Why this fit cannot support posterior-based classification, if at all.
    ///
    /// A fit is degenerate when either mixing weight has collapsed, a
    /// residual variance has collapsed, or the two fitted curves are
    /// numerically indistinguishable over the observed complexity range.
    pub fn degeneracy_reason(&self, complexity_range: (f64, f64)) -> Option<String> {
        for component in &self.components {
            if component.weight < MIN_WEIGHT || component.weight > 1.0 - MIN_WEIGHT {
                return Some(format!(
                    "mixing weight collapsed to {:.2e}",
                    component.weight.min(1.0 - component.weight)
                ));
            }
            if component.variance < MIN_VARIANCE {
                return Some(format!(
                    "residual variance collapsed to {:.2e}",
                    component.variance
                ));
            }
        }

        let (lo, hi) = complexity_range;
        let step = if CURVE_GRID > 1 {
            (hi - lo) / (CURVE_GRID - 1) as f64
        } else {
            0.0
        };
        let mut gap_sum = 0.0;
        for g in 0..CURVE_GRID {
            let x = lo + step * g as f64;
            let mu0 = self.components[0].predict_at(&self.basis, x);
            let mu1 = self.components[1].predict_at(&self.basis, x);
            gap_sum += (mu0 - mu1).abs();
        }
        let mean_gap = gap_sum / CURVE_GRID as f64;
        let tolerance = 1e-8 + SEPARATION_FRACTION * self.pooled_sd();
        if mean_gap < tolerance {
            return Some(format!(
                "fitted curves are indistinguishable (mean gap {:.3e} below {:.3e})",
                mean_gap, tolerance
            ));
        }

        None
    }

    /// Check the degeneracy predicate without the diagnostic text.
    pub fn is_degenerate(&self, complexity_range: (f64, f64)) -> bool {
        self.degeneracy_reason(complexity_range).is_some()
    }

    /// Validate the mixing-weight invariant (each in (0,1), summing to 1).
    pub fn check_weights(&self) -> Result<()> {
        let [a, b] = &self.components;
        let sum = a.weight + b.weight;
        if !(a.weight > 0.0 && a.weight < 1.0 && b.weight > 0.0 && b.weight < 1.0) {
            return Err(QcError::Numerical(format!(
                "mixing weights out of range: {} and {}",
                a.weight, b.weight
            )));
        }
        if (sum - 1.0).abs() > 1e-8 {
            return Err(QcError::Numerical(format!(
                "mixing weights sum to {} instead of 1",
                sum
            )));
        }
        Ok(())
    }
}

/// Diagnostic returned when no restart produced a usable two-component fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegenerateFit {
    /// Basis family that was attempted.
    pub basis: BasisType,
    /// Number of restarts tried.
    pub n_restarts: usize,
    /// Best log-likelihood reached by any restart, if any converged at all.
    pub best_log_likelihood: Option<f64>,
    /// Reason reported by the best attempt.
    pub reason: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::basis::BasisType;

    pub(crate) fn test_basis() -> Basis {
        let complexity: Vec<f64> = (0..40).map(|i| 500.0 + 100.0 * i as f64).collect();
        Basis::fit(&BasisType::Linear, &complexity).unwrap()
    }

    pub(crate) fn healthy_model() -> MixtureModel {
        MixtureModel {
            components: [
                MixtureComponent {
                    coefficients: vec![2.0, -0.5],
                    variance: 1.0,
                    weight: 0.85,
                },
                MixtureComponent {
                    coefficients: vec![25.0, -4.0],
                    variance: 16.0,
                    weight: 0.15,
                },
            ],
            basis: test_basis(),
            log_likelihood: -100.0,
            iterations: 12,
            converged: true,
            restart_seed: 42,
        }
    }

    #[test]
    fn test_healthy_model_not_degenerate() {
        let model = healthy_model();
        assert!(model.degeneracy_reason((500.0, 4400.0)).is_none());
        model.check_weights().unwrap();
    }

    #[test]
    fn test_collapsed_weight_is_degenerate() {
        let mut model = healthy_model();
        model.components[1].weight = 5e-4;
        model.components[0].weight = 1.0 - 5e-4;
        let reason = model.degeneracy_reason((500.0, 4400.0)).unwrap();
        assert!(reason.contains("weight"));
    }

    #[test]
    fn test_identical_curves_are_degenerate() {
        let mut model = healthy_model();
        model.components[1].coefficients = model.components[0].coefficients.clone();
        model.components[1].variance = model.components[0].variance;
        let reason = model.degeneracy_reason((500.0, 4400.0)).unwrap();
        assert!(reason.contains("indistinguishable"));
    }

    #[test]
    fn test_collapsed_variance_is_degenerate() {
        let mut model = healthy_model();
        model.components[0].variance = 1e-12;
        let reason = model.degeneracy_reason((500.0, 4400.0)).unwrap();
        assert!(reason.contains("variance"));
    }

    #[test]
    fn test_weight_invariant_violation() {
        let mut model = healthy_model();
        model.components[0].weight = 0.9;
        assert!(model.check_weights().is_err());
    }
}
