//! QC run orchestration.

mod runner;

pub use runner::{run_qc, QcConfig};
