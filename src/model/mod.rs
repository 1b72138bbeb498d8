//! Mixture-model fitting for the damage/complexity metric pair.

pub mod basis;
pub mod em;
pub mod fit;
pub mod label;
pub mod mixture;
pub mod posterior;

pub use basis::{Basis, BasisType};
pub use fit::{fit_mixture, FitConfig, FitOutcome};
pub use label::{label, label_compromised, LabeledModel};
pub use mixture::{DegenerateFit, MixtureComponent, MixtureModel};
pub use posterior::posteriors;
