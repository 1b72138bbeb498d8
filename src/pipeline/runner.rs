//! End-to-end QC run: validate, fit, classify or fall back.

use crate::classify::{apply_backup, classify, validate_cutoff, BackupRule};
use crate::data::{CellDecision, CellMetrics, ModelOutcome, QcResultSet, QcWarning};
use crate::error::{QcError, Result};
use crate::model::{fit_mixture, label, posteriors, BasisType, FitConfig, FitOutcome};
use serde::{Deserialize, Serialize};

/// Configuration for a QC run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcConfig {
    /// Tolerance for compromised-probability; records at or above it are
    /// discarded.
    pub posterior_cutoff: f64,
    /// Regression basis for the complexity covariate.
    pub basis: BasisType,
    /// Rule applied when the mixture fit is degenerate.
    pub backup: BackupRule,
    /// Number of independent EM restarts.
    pub n_restarts: usize,
    /// Seed for restart initialization.
    pub seed: u64,
    /// EM iteration bound per restart.
    pub max_iter: usize,
    /// Relative log-likelihood convergence tolerance.
    pub tol: f64,
    /// Run restarts on the rayon pool.
    pub parallel: bool,
    /// Minimum records per component in restart initialization.
    pub min_component: usize,
}

impl Default for QcConfig {
    fn default() -> Self {
        let fit = FitConfig::default();
        Self {
            posterior_cutoff: 0.75,
            basis: fit.basis,
            backup: BackupRule::Percentile { quantile: 0.95 },
            n_restarts: fit.n_restarts,
            seed: fit.seed,
            max_iter: fit.max_iter,
            tol: fit.tol,
            parallel: fit.parallel,
            min_component: fit.min_component,
        }
    }
}

impl QcConfig {
    /// Set the posterior cutoff.
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.posterior_cutoff = cutoff;
        self
    }

    /// Set the basis type.
    pub fn with_basis(mut self, basis: BasisType) -> Self {
        self.basis = basis;
        self
    }

    /// Set the backup rule.
    pub fn with_backup(mut self, backup: BackupRule) -> Self {
        self.backup = backup;
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

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(QcError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(QcError::from)
    }

    /// The fitting subset of this configuration.
    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            basis: self.basis.clone(),
            n_restarts: self.n_restarts,
            seed: self.seed,
            max_iter: self.max_iter,
            tol: self.tol,
            parallel: self.parallel,
            min_component: self.min_component,
        }
    }

    /// Validate every parameter before any fitting work.
    pub fn validate(&self) -> Result<()> {
        validate_cutoff(self.posterior_cutoff)?;
        self.backup.validate()?;
        self.fit_config().validate()
    }
}

/// Run the full QC classification.
///
/// Validates the configuration, fits the two-component mixture, and either
/// classifies by posterior under the labeled model or applies the
/// configured fallback rule when the fit is degenerate.
pub fn run_qc(metrics: &CellMetrics, config: &QcConfig) -> Result<QcResultSet> {
    config.validate()?;

    match fit_mixture(metrics, &config.fit_config())? {
        FitOutcome::Fitted(model) => {
            let mut warnings = Vec::new();
            if !model.converged {
                warnings.push(QcWarning::IterationLimit {
                    iterations: model.iterations,
                });
            }

            let labeled = label(model, metrics);
            let posterior = posteriors(&labeled.model, metrics)?;
            let keep = classify(&posterior, labeled.compromised, config.posterior_cutoff)?;

            let decisions = metrics
                .cell_ids()
                .iter()
                .zip(posterior.iter().zip(keep))
                .map(|(cell_id, (p, keep))| CellDecision {
                    cell_id: cell_id.clone(),
                    prob_compromised: Some(p[labeled.compromised]),
                    keep,
                })
                .collect();

            Ok(QcResultSet {
                decisions,
                outcome: ModelOutcome::Mixture(labeled),
                warnings,
            })
        }
        FitOutcome::Degenerate(diagnostic) => {
            log::warn!(
                "mixture fit degenerate after {} restarts: {}",
                diagnostic.n_restarts,
                diagnostic.reason
            );
            let (decisions, warnings) =
                apply_backup(&config.backup, metrics, &diagnostic.reason)?;
            Ok(QcResultSet {
                decisions,
                outcome: ModelOutcome::Fallback {
                    rule: config.backup.clone(),
                    diagnostic,
                },
                warnings,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{generate_synthetic, SyntheticConfig};

    #[test]
    fn test_invalid_cutoff_rejected_before_fitting() {
        // Three records would also fail the input-size check, but the
        // cutoff must be rejected first.
        let metrics = CellMetrics::from_vectors(
            vec![1.0, 2.0, 3.0],
            vec![100.0, 200.0, 300.0],
        )
        .unwrap();
        let config = QcConfig::default().with_cutoff(1.5);
        assert!(matches!(
            run_qc(&metrics, &config),
            Err(QcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mixture_path_produces_posteriors() {
        let data = generate_synthetic(
            &SyntheticConfig::default().with_populations(270, 30).with_seed(5),
        )
        .unwrap();
        let results = run_qc(&data.metrics, &QcConfig::default()).unwrap();
        assert_eq!(results.len(), 300);
        assert!(!results.outcome.is_fallback());
        assert!(results
            .decisions
            .iter()
            .all(|d| d.prob_compromised.is_some()));
    }

    #[test]
    fn test_fallback_path_on_single_population() {
        let data =
            generate_synthetic(&SyntheticConfig::single_population(400).with_seed(3)).unwrap();
        let config = QcConfig::default().with_backup(BackupRule::Pass);
        let results = run_qc(&data.metrics, &config).unwrap();
        assert!(results.outcome.is_fallback());
        assert_eq!(results.n_kept(), 400);
        assert!(results
            .warnings
            .iter()
            .any(|w| matches!(w, QcWarning::InseparableComponents { .. })));
    }

    #[test]
    fn test_halt_surfaces_fatal_error() {
        let data =
            generate_synthetic(&SyntheticConfig::single_population(400).with_seed(3)).unwrap();
        let config = QcConfig::default().with_backup(BackupRule::Halt);
        assert!(matches!(
            run_qc(&data.metrics, &config),
            Err(QcError::DegenerateHalt(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = QcConfig::default()
            .with_cutoff(0.6)
            .with_basis(BasisType::Polynomial { degree: 2 })
            .with_backup(BackupRule::Percent { max_damage: 15.0 })
            .with_seed(99);
        let yaml = config.to_yaml().unwrap();
        let parsed = QcConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.posterior_cutoff, 0.6);
        assert_eq!(parsed.basis, BasisType::Polynomial { degree: 2 });
        assert_eq!(parsed.backup, BackupRule::Percent { max_damage: 15.0 });
        assert_eq!(parsed.seed, 99);
    }
}
