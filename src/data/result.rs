//! Result types for QC classification.

use crate::classify::BackupRule;
use crate::error::Result;
use crate::model::label::LabeledModel;
use crate::model::mixture::DegenerateFit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Keep/discard decision for a single cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellDecision {
    /// Cell identifier.
    pub cell_id: String,
    /// Posterior probability of compromised-component membership.
    /// `None` when the decision came from a non-probabilistic fallback rule.
    pub prob_compromised: Option<f64>,
    /// Whether the cell passes QC.
    pub keep: bool,
}

/// How the decisions were produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelOutcome {
    /// Posterior-based classification under a labeled two-component fit.
    Mixture(LabeledModel),
    /// Fallback rule applied because the fit was degenerate.
    Fallback {
        rule: BackupRule,
        diagnostic: DegenerateFit,
    },
}

impl ModelOutcome {
    /// The labeled model, when the mixture path was taken.
    pub fn model(&self) -> Option<&LabeledModel> {
        match self {
            Self::Mixture(labeled) => Some(labeled),
            Self::Fallback { .. } => None,
        }
    }

    /// Whether a fallback rule produced the decisions.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Non-fatal conditions surfaced alongside a decision set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QcWarning {
    /// The two-population assumption failed; a fallback rule was applied.
    InseparableComponents { reason: String },
    /// The pass rule kept every record; no QC filtering happened.
    FilteringSkipped,
    /// The winning restart hit the iteration bound without converging.
    IterationLimit { iterations: usize },
}

impl fmt::Display for QcWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InseparableComponents { reason } => {
                write!(f, "could not identify two distinct populations: {}", reason)
            }
            Self::FilteringSkipped => {
                write!(f, "QC filtering was skipped; every record was kept")
            }
            Self::IterationLimit { iterations } => write!(
                f,
                "model selected after hitting the iteration bound ({} iterations) without convergence",
                iterations
            ),
        }
    }
}

/// Full output of one QC run: per-cell decisions, the model (or fallback)
/// that produced them, and any warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcResultSet {
    /// Per-cell decisions, aligned with the input record order.
    pub decisions: Vec<CellDecision>,
    /// Model metadata.
    pub outcome: ModelOutcome,
    /// Warnings accumulated during the run.
    pub warnings: Vec<QcWarning>,
}

impl QcResultSet {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Number of records kept.
    pub fn n_kept(&self) -> usize {
        self.decisions.iter().filter(|d| d.keep).count()
    }

    /// Number of records discarded.
    pub fn n_discarded(&self) -> usize {
        self.len() - self.n_kept()
    }

    /// Keep flags in record order.
    pub fn keep_flags(&self) -> Vec<bool> {
        self.decisions.iter().map(|d| d.keep).collect()
    }

    /// Compromised-membership probabilities in record order.
    pub fn probabilities(&self) -> Vec<Option<f64>> {
        self.decisions.iter().map(|d| d.prob_compromised).collect()
    }

    /// Write decisions to a TSV file (`NA` where no posterior exists).
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "cell_id\tprob_compromised\tkeep")?;
        for d in &self.decisions {
            let prob = match d.prob_compromised {
                Some(p) => format!("{}", p),
                None => "NA".to_string(),
            };
            writeln!(writer, "{}\t{}\t{}", d.cell_id, prob, d.keep)?;
        }
        Ok(())
    }

    /// Convert to JSON format for export.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Counts for reporting.
    pub fn summary(&self) -> QcSummary {
        QcSummary {
            total: self.len(),
            kept: self.n_kept(),
            discarded: self.n_discarded(),
            fallback: self.outcome.is_fallback(),
            warnings: self.warnings.len(),
        }
    }
}

/// Compact run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcSummary {
    pub total: usize,
    pub kept: usize,
    pub discarded: usize,
    pub fallback: bool,
    pub warnings: usize,
}

impl fmt::Display for QcSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records:   {}", self.total)?;
        writeln!(f, "Kept:      {}", self.kept)?;
        writeln!(f, "Discarded: {}", self.discarded)?;
        writeln!(
            f,
            "Path:      {}",
            if self.fallback {
                "fallback rule"
            } else {
                "mixture posterior"
            }
        )?;
        write!(f, "Warnings:  {}", self.warnings)
    }
}
