//! Core data structures for QC classification.

mod metrics;
mod result;

pub use metrics::CellMetrics;
pub use result::{CellDecision, ModelOutcome, QcResultSet, QcSummary, QcWarning};
