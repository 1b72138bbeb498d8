//! Posterior membership probabilities under a fitted mixture.

use crate::data::CellMetrics;
use crate::error::{QcError, Result};
use crate::model::mixture::{MixtureComponent, MixtureModel};
use statrs::distribution::{Continuous, Normal};

/// log(exp(a) + exp(b)) without intermediate overflow or underflow.
pub(crate) fn log_sum_exp(a: f64, b: f64) -> f64 {
    let m = a.max(b);
    if m == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Per-record membership probabilities given component means `mu` for each
/// record, plus the total log-likelihood. All accumulation happens in log
/// space so residuals far from both curves cannot underflow to 0/0.
pub(crate) fn responsibilities(
    y: &[f64],
    mu: [&[f64]; 2],
    components: &[MixtureComponent; 2],
) -> Result<(Vec<[f64; 2]>, f64)> {
    let mut densities = Vec::with_capacity(2);
    for component in components {
        let sd = component.variance.sqrt();
        let normal = Normal::new(0.0, sd)
            .map_err(|e| QcError::Numerical(format!("invalid residual distribution: {}", e)))?;
        densities.push((component.weight.ln(), normal));
    }

    let mut posteriors = Vec::with_capacity(y.len());
    let mut log_likelihood = 0.0;
    for i in 0..y.len() {
        let log_a = densities[0].0 + densities[0].1.ln_pdf(y[i] - mu[0][i]);
        let log_b = densities[1].0 + densities[1].1.ln_pdf(y[i] - mu[1][i]);
        let norm = log_sum_exp(log_a, log_b);
        log_likelihood += norm;
        if norm == f64::NEG_INFINITY {
            // Both components assign zero density; split the mass evenly.
            posteriors.push([0.5, 0.5]);
        } else {
            posteriors.push([(log_a - norm).exp(), (log_b - norm).exp()]);
        }
    }
    Ok((posteriors, log_likelihood))
}

/// Posterior probability of each record belonging to each component.
///
/// Standard mixture posterior: each component's mixing weight times the
/// Gaussian likelihood of the damage residual under that component's
/// regression curve, normalized across the two components.
pub fn posteriors(model: &MixtureModel, metrics: &CellMetrics) -> Result<Vec<[f64; 2]>> {
    let mu0 = model.predict(0, metrics.complexity());
    let mu1 = model.predict(1, metrics.complexity());
    let (posteriors, _) = responsibilities(metrics.damage(), [&mu0, &mu1], &model.components)?;
    Ok(posteriors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mixture::tests::healthy_model;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_sum_exp_extremes() {
        assert_relative_eq!(log_sum_exp(0.0, 0.0), std::f64::consts::LN_2);
        // A term 1000 nats below the max contributes nothing but must not
        // produce NaN.
        let v = log_sum_exp(-5.0, -1005.0);
        assert_relative_eq!(v, -5.0, epsilon = 1e-12);
        assert_eq!(log_sum_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn test_posteriors_normalize() {
        let model = healthy_model();
        let metrics = crate::data::CellMetrics::from_vectors(
            vec![1.5, 30.0, 8.0],
            vec![3000.0, 600.0, 1500.0],
        )
        .unwrap();
        let post = posteriors(&model, &metrics).unwrap();
        for p in &post {
            assert_relative_eq!(p[0] + p[1], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_far_tail_is_stable() {
        let model = healthy_model();
        // Damage far above both curves: the wider, higher component must
        // win and nothing may underflow to NaN.
        let metrics =
            crate::data::CellMetrics::from_vectors(vec![95.0], vec![2000.0]).unwrap();
        let post = posteriors(&model, &metrics).unwrap();
        assert!(post[0][0].is_finite() && post[0][1].is_finite());
        assert_relative_eq!(post[0][0] + post[0][1], 1.0, epsilon = 1e-12);
        assert!(post[0][1] > 0.999);
    }

    #[test]
    fn test_records_near_curves_assigned_correctly() {
        let model = healthy_model();
        // Low damage at high complexity sits on the intact curve.
        let metrics = crate::data::CellMetrics::from_vectors(
            vec![1.0, 40.0],
            vec![4000.0, 600.0],
        )
        .unwrap();
        let post = posteriors(&model, &metrics).unwrap();
        assert!(post[0][0] > 0.99);
        assert!(post[1][1] > 0.99);
    }
}
