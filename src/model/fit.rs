//! Multi-restart mixture fitting.
//!
//! Restarts are independent EM runs from random partitions of the records,
//! each seeded from the caller's seed plus the restart index. Restarts are
//! pure given (data, restart seed), so they run in parallel and reduce
//! sequentially in restart order, keeping results bit-identical regardless
//! of scheduling.

use crate::data::CellMetrics;
use crate::error::{QcError, Result};
use crate::model::basis::{Basis, BasisType};
use crate::model::em::{run_em, EmSettings};
use crate::model::mixture::{DegenerateFit, MixtureModel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Redraws of the random partition before falling back to a median split.
const MAX_PARTITION_DRAWS: usize = 10;

/// Configuration for mixture fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    /// Regression basis for the complexity covariate.
    pub basis: BasisType,
    /// Number of independent restarts.
    pub n_restarts: usize,
    /// Seed for restart initialization; restart `k` uses `seed + k`.
    pub seed: u64,
    /// EM iteration bound per restart.
    pub max_iter: usize,
    /// Relative log-likelihood change below which EM stops.
    pub tol: f64,
    /// Run restarts on the rayon pool.
    pub parallel: bool,
    /// Minimum records per component in the initial partition; inputs must
    /// contain at least twice this many records.
    pub min_component: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            basis: BasisType::Linear,
            n_restarts: 10,
            seed: 42,
            max_iter: 200,
            tol: 1e-6,
            parallel: true,
            min_component: 10,
        }
    }
}

impl FitConfig {
    /// Set the basis type.
    pub fn with_basis(mut self, basis: BasisType) -> Self {
        self.basis = basis;
        self
    }

    /// Set the restart count.
    pub fn with_restarts(mut self, n_restarts: usize) -> Self {
        self.n_restarts = n_restarts;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable parallel restarts.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validate all fitting parameters.
    pub fn validate(&self) -> Result<()> {
        self.basis.validate()?;
        if self.n_restarts == 0 {
            return Err(QcError::InvalidParameter(
                "n_restarts must be positive".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(QcError::InvalidParameter(
                "max_iter must be positive".to_string(),
            ));
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(QcError::InvalidParameter(
                "tol must be a positive finite number".to_string(),
            ));
        }
        if self.min_component < 2 {
            return Err(QcError::InvalidParameter(
                "min_component must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a fitting attempt: a usable two-component model, or a
/// diagnostic explaining why no restart produced one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FitOutcome {
    /// A converged, separable two-component fit.
    Fitted(MixtureModel),
    /// Every restart was degenerate or failed numerically.
    Degenerate(DegenerateFit),
}

enum RestartOutcome {
    Usable(MixtureModel),
    Degenerate { model: MixtureModel, reason: String },
    Failed,
}

/// Simple deterministic RNG (xorshift64).
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Fit the two-component mixture with multiple restarts.
///
/// Returns the highest-likelihood non-degenerate restart, ties broken by
/// fewer EM iterations and then by lower restart index. When every restart
/// is degenerate or fails, returns `FitOutcome::Degenerate` with the best
/// available diagnostic.
pub fn fit_mixture(metrics: &CellMetrics, config: &FitConfig) -> Result<FitOutcome> {
    config.validate()?;

    let required = 2 * config.min_component;
    if metrics.len() < required {
        return Err(QcError::InputTooSmall {
            required,
            actual: metrics.len(),
        });
    }

    let basis = Basis::fit(&config.basis, metrics.complexity())?;
    let design = basis.expand(metrics.complexity());
    let settings = EmSettings {
        max_iter: config.max_iter,
        tol: config.tol,
    };
    let complexity_range = metrics.complexity_range();

    let run_restart = |k: usize| -> RestartOutcome {
        let restart_seed = config.seed.wrapping_add(k as u64);
        let initial = initial_partition(metrics.damage(), restart_seed, config.min_component);
        match run_em(
            metrics.damage(),
            &design,
            &initial,
            &basis,
            &settings,
            restart_seed,
        ) {
            Some(model) => match model.degeneracy_reason(complexity_range) {
                None => RestartOutcome::Usable(model),
                Some(reason) => RestartOutcome::Degenerate { model, reason },
            },
            None => RestartOutcome::Failed,
        }
    };

    let outcomes: Vec<RestartOutcome> = if config.parallel {
        (0..config.n_restarts).into_par_iter().map(run_restart).collect()
    } else {
        (0..config.n_restarts).map(run_restart).collect()
    };

    reduce_restarts(outcomes, config)
}

/// Select the winning restart; sequential and order-dependent only on the
/// restart index, never on scheduling.
fn reduce_restarts(outcomes: Vec<RestartOutcome>, config: &FitConfig) -> Result<FitOutcome> {
    let mut best: Option<MixtureModel> = None;
    let mut best_degenerate: Option<(MixtureModel, String)> = None;
    let mut n_failed = 0;

    for (k, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            RestartOutcome::Usable(model) => {
                let replace = match &best {
                    None => true,
                    Some(current) => {
                        model.log_likelihood > current.log_likelihood
                            || (model.log_likelihood == current.log_likelihood
                                && model.iterations < current.iterations)
                    }
                };
                if replace {
                    best = Some(model);
                }
            }
            RestartOutcome::Degenerate { model, reason } => {
                log::debug!("restart {} degenerate: {}", k, reason);
                let replace = match &best_degenerate {
                    None => true,
                    Some((current, _)) => model.log_likelihood > current.log_likelihood,
                };
                if replace {
                    best_degenerate = Some((model, reason));
                }
            }
            RestartOutcome::Failed => {
                n_failed += 1;
            }
        }
    }

    if let Some(model) = best {
        model.check_weights()?;
        return Ok(FitOutcome::Fitted(model));
    }

    let (best_log_likelihood, reason) = match best_degenerate {
        Some((model, reason)) => (Some(model.log_likelihood), reason),
        None => (
            None,
            format!("all {} restarts failed numerically", n_failed),
        ),
    };
    Ok(FitOutcome::Degenerate(DegenerateFit {
        basis: config.basis.clone(),
        n_restarts: config.n_restarts,
        best_log_likelihood,
        reason,
    }))
}

/// Random hard partition of the records into two groups, redrawn until
/// both sides reach `min_component` and falling back to a median split on
/// the damage metric.
fn initial_partition(damage: &[f64], restart_seed: u64, min_component: usize) -> Vec<usize> {
    let n = damage.len();
    let mut rng = SimpleRng::new(restart_seed);

    for _ in 0..MAX_PARTITION_DRAWS {
        let assignment: Vec<usize> = (0..n).map(|_| (rng.next_u64() & 1) as usize).collect();
        let ones = assignment.iter().sum::<usize>();
        if ones >= min_component && n - ones >= min_component {
            return assignment;
        }
    }

    // Median split: low-damage half against high-damage half.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| damage[a].partial_cmp(&damage[b]).unwrap());
    let mut assignment = vec![0; n];
    for &idx in order.iter().skip(n / 2) {
        assignment[idx] = 1;
    }
    assignment
}
