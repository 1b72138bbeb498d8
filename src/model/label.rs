//! Post-fit resolution of the mixture's label-switching ambiguity.

use crate::data::CellMetrics;
use crate::model::mixture::MixtureModel;
use serde::{Deserialize, Serialize};

/// A mixture model with the compromised component identified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledModel {
    /// The underlying fit, components in the fitter's arbitrary order.
    pub model: MixtureModel,
    /// Index (0 or 1) of the component representing compromised cells.
    pub compromised: usize,
}

impl LabeledModel {
    /// Index of the intact component.
    pub fn intact(&self) -> usize {
        1 - self.compromised
    }
}

/// Identify the compromised component.
///
/// The compromised component is the one whose fitted curve predicts the
/// higher damage at the low end of the observed complexity range. Exact
/// ties fall through to the prediction at the range midpoint, then to the
/// smaller mixing weight (the degraded population is the minority one).
/// EM's internal component ordering is arbitrary; this rule is computed
/// once per fit and never per record.
pub fn label_compromised(model: &MixtureModel, metrics: &CellMetrics) -> usize {
    let (lo, hi) = metrics.complexity_range();

    for x in [lo, 0.5 * (lo + hi)] {
        let p0 = model.components[0].predict_at(&model.basis, x);
        let p1 = model.components[1].predict_at(&model.basis, x);
        if p0 != p1 {
            return if p0 > p1 { 0 } else { 1 };
        }
    }

    let w0 = model.components[0].weight;
    let w1 = model.components[1].weight;
    if w1 < w0 {
        1
    } else {
        0
    }
}

/// Attach the compromised-component designation to a fitted model.
pub fn label(model: MixtureModel, metrics: &CellMetrics) -> LabeledModel {
    let compromised = label_compromised(&model, metrics);
    LabeledModel { model, compromised }
}
