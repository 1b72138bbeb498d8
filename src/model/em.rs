//! Expectation-Maximization for the two-component mixture regression.
//!
//! One call fits one restart: starting from a hard partition of the
//! records, alternate weighted least squares per component (M-step) with
//! log-space responsibility updates (E-step) until the relative
//! log-likelihood change falls below tolerance or the iteration bound is
//! reached. Numerical failures return `None`; degeneracy is judged by the
//! caller on the returned model.

use crate::model::basis::Basis;
use crate::model::mixture::{MixtureComponent, MixtureModel};
use crate::model::posterior::responsibilities;
use nalgebra::{DMatrix, DVector};

/// Variance floor applied in the M-step. Kept below the degeneracy floor
/// so a collapsed component is reported as degenerate rather than silently
/// clamped into a usable fit.
const VARIANCE_FLOOR: f64 = 1e-12;

/// Iteration controls for one EM run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmSettings {
    pub max_iter: usize,
    pub tol: f64,
}

/// Run EM from a hard initial partition (`initial[i]` is 0 or 1).
///
/// Returns `None` when the run fails numerically: a component's effective
/// sample shrinks below the coefficient count, or the weighted normal
/// equations become singular.
pub(crate) fn run_em(
    y: &[f64],
    design: &DMatrix<f64>,
    initial: &[usize],
    basis: &Basis,
    settings: &EmSettings,
    restart_seed: u64,
) -> Option<MixtureModel> {
    let n = y.len();
    let mut resp: Vec<[f64; 2]> = initial
        .iter()
        .map(|&k| if k == 0 { [1.0, 0.0] } else { [0.0, 1.0] })
        .collect();

    let mut components;
    let mut log_likelihood;
    let mut prev = f64::NEG_INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    loop {
        components = m_step(y, design, &resp)?;

        let mu0 = predicted(design, &components[0]);
        let mu1 = predicted(design, &components[1]);
        let (new_resp, ll) = match responsibilities(y, [&mu0, &mu1], &components) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("restart seed {}: E-step failed: {}", restart_seed, e);
                return None;
            }
        };
        resp = new_resp;
        log_likelihood = ll;
        iterations += 1;

        if (ll - prev).abs() / prev.abs().max(1.0) < settings.tol {
            converged = true;
            break;
        }
        if iterations >= settings.max_iter {
            break;
        }
        prev = ll;
    }

    debug_assert_eq!(resp.len(), n);
    Some(MixtureModel {
        components,
        basis: basis.clone(),
        log_likelihood,
        iterations,
        converged,
        restart_seed,
    })
}

/// Re-estimate both components from the current responsibilities.
fn m_step(
    y: &[f64],
    design: &DMatrix<f64>,
    resp: &[[f64; 2]],
) -> Option<[MixtureComponent; 2]> {
    let n = y.len();
    let p = design.ncols();
    let mut components = Vec::with_capacity(2);

    for k in 0..2 {
        let weights: Vec<f64> = resp.iter().map(|r| r[k]).collect();
        let weight_sum: f64 = weights.iter().sum();
        if weight_sum < (p + 1) as f64 {
            log::debug!(
                "component {} effective sample {:.2} below coefficient count {}",
                k,
                weight_sum,
                p
            );
            return None;
        }

        // Weighted normal equations: beta = (X'WX)^-1 X'Wy.
        let mut weighted_design = design.clone();
        for i in 0..n {
            for j in 0..p {
                weighted_design[(i, j)] *= weights[i];
            }
        }
        let xtwx = design.transpose() * &weighted_design;
        let xtwx_inv = match xtwx.try_inverse() {
            Some(inv) => inv,
            None => {
                log::debug!("component {} weighted normal equations are singular", k);
                return None;
            }
        };
        let wy = DVector::from_iterator(n, (0..n).map(|i| weights[i] * y[i]));
        let beta = &xtwx_inv * (design.transpose() * wy);

        let fitted = design * &beta;
        let mut rss = 0.0;
        for i in 0..n {
            let r = y[i] - fitted[i];
            rss += weights[i] * r * r;
        }
        let variance = (rss / weight_sum).max(VARIANCE_FLOOR);

        components.push(MixtureComponent {
            coefficients: beta.iter().cloned().collect(),
            variance,
            weight: weight_sum / n as f64,
        });
    }

    let pair: [MixtureComponent; 2] = components.try_into().ok()?;
    Some(pair)
}

fn predicted(design: &DMatrix<f64>, component: &MixtureComponent) -> Vec<f64> {
    let beta = DVector::from_column_slice(&component.coefficients);
    (design * beta).iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::basis::BasisType;
    use approx::assert_relative_eq;

    /// Two well-separated populations on deterministic noise.
    fn separated_data() -> (Vec<f64>, Vec<f64>, Vec<usize>) {
        let mut damage = Vec::new();
        let mut complexity = Vec::new();
        let mut truth = Vec::new();
        for i in 0..80 {
            // Deterministic jitter in [-0.5, 0.5).
            let jitter = ((i * 37) % 100) as f64 / 100.0 - 0.5;
            complexity.push(2000.0 + 25.0 * i as f64);
            damage.push(2.0 + jitter);
            truth.push(0);
        }
        for i in 0..20 {
            let jitter = ((i * 53) % 100) as f64 / 50.0 - 1.0;
            complexity.push(400.0 + 30.0 * i as f64);
            damage.push(30.0 + jitter);
            truth.push(1);
        }
        (damage, complexity, truth)
    }

    #[test]
    fn test_em_recovers_separated_populations() {
        let (damage, complexity, truth) = separated_data();
        let basis = Basis::fit(&BasisType::Linear, &complexity).unwrap();
        let design = basis.expand(&complexity);
        let settings = EmSettings {
            max_iter: 200,
            tol: 1e-8,
        };
        let model = run_em(&damage, &design, &truth, &basis, &settings, 7).unwrap();

        assert!(model.converged);
        // 80/20 split.
        let mut weights = [model.components[0].weight, model.components[1].weight];
        weights.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(weights[0], 0.2, epsilon = 0.05);
        assert_relative_eq!(weights[1], 0.8, epsilon = 0.05);
        assert_relative_eq!(weights[0] + weights[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_em_iteration_bound_reported() {
        let (damage, complexity, truth) = separated_data();
        let basis = Basis::fit(&BasisType::Linear, &complexity).unwrap();
        let design = basis.expand(&complexity);
        let settings = EmSettings {
            max_iter: 1,
            tol: 1e-15,
        };
        let model = run_em(&damage, &design, &truth, &basis, &settings, 7).unwrap();
        assert!(!model.converged);
        assert_eq!(model.iterations, 1);
    }

    #[test]
    fn test_em_is_deterministic() {
        let (damage, complexity, truth) = separated_data();
        let basis = Basis::fit(&BasisType::Linear, &complexity).unwrap();
        let design = basis.expand(&complexity);
        let settings = EmSettings {
            max_iter: 100,
            tol: 1e-8,
        };
        let a = run_em(&damage, &design, &truth, &basis, &settings, 7).unwrap();
        let b = run_em(&damage, &design, &truth, &basis, &settings, 7).unwrap();
        assert_eq!(a.log_likelihood.to_bits(), b.log_likelihood.to_bits());
        assert_eq!(a.iterations, b.iterations);
    }
}
