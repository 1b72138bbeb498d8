//! Adaptive mixture-model quality control for single-cell metrics.
//!
//! Given, for each cell, a damage metric (fraction of reads from a
//! stress-marker gene set) and a complexity metric (count of distinct
//! detected features), this library jointly models both as a two-component
//! mixture regression and returns, per cell, a probability of belonging to
//! the degraded population plus a keep/discard decision.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (CellMetrics, QcResultSet)
//! - **model**: Mixture fitting (basis expansion, EM, restarts, labeling,
//!   posteriors)
//! - **classify**: Cutoff classification and fallback rules
//! - **pipeline**: Configuration and end-to-end execution
//! - **benchmark**: Synthetic data with known ground truth
//!
//! # Example
//!
//! ```no_run
//! use cellsieve::prelude::*;
//!
//! // Aligned per-cell metrics supplied by the dataset container.
//! let metrics = CellMetrics::from_vectors(
//!     vec![1.2, 2.0, 38.5, 1.7],
//!     vec![3500.0, 2800.0, 450.0, 4100.0],
//! ).unwrap();
//!
//! let config = QcConfig::default().with_cutoff(0.75).with_seed(42);
//! let results = run_qc(&metrics, &config).unwrap();
//!
//! for decision in &results.decisions {
//!     println!("{}\t{:?}\t{}", decision.cell_id, decision.prob_compromised, decision.keep);
//! }
//! ```

pub mod benchmark;
pub mod classify;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::benchmark::{generate_synthetic, SyntheticConfig, SyntheticData};
    pub use crate::classify::{apply_backup, classify, keep_record, validate_cutoff, BackupRule};
    pub use crate::data::{
        CellDecision, CellMetrics, ModelOutcome, QcResultSet, QcSummary, QcWarning,
    };
    pub use crate::error::{QcError, Result};
    pub use crate::model::{
        fit_mixture, label, label_compromised, posteriors, Basis, BasisType, DegenerateFit,
        FitConfig, FitOutcome, LabeledModel, MixtureComponent, MixtureModel,
    };
    pub use crate::pipeline::{run_qc, QcConfig};
}
