//! Fallback decision rules for degenerate fits.
//!
//! Invoked only when no restart identified two separable populations. All
//! rules except `Halt` still return a decision set, always accompanied by
//! a warning that the two-population assumption failed.

use crate::data::{CellDecision, CellMetrics, QcWarning};
use crate::error::{QcError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};

/// Decision rule applied when the mixture model is degenerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackupRule {
    /// Discard records whose damage exceeds this empirical quantile of the
    /// observed damage distribution.
    Percentile { quantile: f64 },
    /// Discard records whose damage exceeds this absolute value.
    Percent { max_damage: f64 },
    /// Keep every record; QC filtering is skipped.
    Pass,
    /// Refuse to produce decisions; surfaces a fatal error.
    Halt,
}

impl BackupRule {
    /// Validate the rule's parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Percentile { quantile } => {
                if !(quantile.is_finite() && (0.0..=1.0).contains(quantile)) {
                    return Err(QcError::InvalidParameter(format!(
                        "backup percentile must be in [0, 1], got {}",
                        quantile
                    )));
                }
                Ok(())
            }
            Self::Percent { max_damage } => {
                if !(max_damage.is_finite() && *max_damage >= 0.0) {
                    return Err(QcError::InvalidParameter(format!(
                        "backup damage threshold must be non-negative, got {}",
                        max_damage
                    )));
                }
                Ok(())
            }
            Self::Pass | Self::Halt => Ok(()),
        }
    }

    /// Short name used in logs and warnings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Percentile { .. } => "percentile",
            Self::Percent { .. } => "percent",
            Self::Pass => "pass",
            Self::Halt => "halt",
        }
    }
}

/// Apply a fallback rule to the raw damage metric.
///
/// `reason` is the degeneracy diagnostic; it is carried into the warning
/// attached to every non-halt outcome.
pub fn apply_backup(
    rule: &BackupRule,
    metrics: &CellMetrics,
    reason: &str,
) -> Result<(Vec<CellDecision>, Vec<QcWarning>)> {
    rule.validate()?;

    let mut warnings = vec![QcWarning::InseparableComponents {
        reason: reason.to_string(),
    }];

    let keep: Vec<bool> = match rule {
        BackupRule::Percentile { quantile } => {
            let mut data = Data::new(metrics.damage().to_vec());
            let threshold = data.quantile(*quantile);
            metrics.damage().iter().map(|&d| d <= threshold).collect()
        }
        BackupRule::Percent { max_damage } => {
            metrics.damage().iter().map(|&d| d <= *max_damage).collect()
        }
        BackupRule::Pass => {
            warnings.push(QcWarning::FilteringSkipped);
            vec![true; metrics.len()]
        }
        BackupRule::Halt => {
            return Err(QcError::DegenerateHalt(reason.to_string()));
        }
    };

    let decisions = metrics
        .cell_ids()
        .iter()
        .zip(keep)
        .map(|(cell_id, keep)| CellDecision {
            cell_id: cell_id.clone(),
            prob_compromised: None,
            keep,
        })
        .collect();

    Ok((decisions, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> CellMetrics {
        // Damage 1..=100 over matching complexity.
        let damage: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let complexity: Vec<f64> = (1..=100).map(|i| 100.0 * i as f64).collect();
        CellMetrics::from_vectors(damage, complexity).unwrap()
    }

    #[test]
    fn test_percent_discards_above_threshold() {
        let rule = BackupRule::Percent { max_damage: 80.0 };
        let (decisions, warnings) = apply_backup(&rule, &metrics(), "inseparable").unwrap();
        let kept = decisions.iter().filter(|d| d.keep).count();
        assert_eq!(kept, 80);
        assert!(decisions.iter().all(|d| d.prob_compromised.is_none()));
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            QcWarning::InseparableComponents { .. }
        ));
    }

    #[test]
    fn test_percentile_discards_upper_tail() {
        let rule = BackupRule::Percentile { quantile: 0.9 };
        let (decisions, _) = apply_backup(&rule, &metrics(), "inseparable").unwrap();
        let kept = decisions.iter().filter(|d| d.keep).count();
        // Records at or below the 90th percentile survive.
        assert!((89..=91).contains(&kept));
        // The highest-damage record never survives a 0.9 quantile rule.
        assert!(!decisions[99].keep);
    }

    #[test]
    fn test_pass_keeps_all_with_warning() {
        let (decisions, warnings) = apply_backup(&BackupRule::Pass, &metrics(), "r").unwrap();
        assert!(decisions.iter().all(|d| d.keep));
        assert!(warnings.contains(&QcWarning::FilteringSkipped));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_halt_raises() {
        let result = apply_backup(&BackupRule::Halt, &metrics(), "inseparable");
        assert!(matches!(result, Err(QcError::DegenerateHalt(_))));
    }

    #[test]
    fn test_invalid_percentile_rejected() {
        let rule = BackupRule::Percentile { quantile: 1.5 };
        assert!(matches!(
            apply_backup(&rule, &metrics(), "r"),
            Err(QcError::InvalidParameter(_))
        ));
    }
}
