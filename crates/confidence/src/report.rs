use serde::{Deserialize, Serialize};

use crate::bayesian::ComponentWeights;
use crate::calibration::CalibrationMetrics;
use crate::components::ConfidenceComponents;
use crate::explanation::{fallback_explanation, Explanation};
use crate::uncertainty::UncertaintyMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    pub overall: f64,
    pub raw: f64,
    pub prior: f64,
    pub components: ConfidenceComponents,
    pub weights: ComponentWeights,
    pub uncertainty: UncertaintyMetrics,
    pub calibration: CalibrationMetrics,
    pub explanation: Explanation,
    #[serde(default)]
    pub fallback_used: bool,
}

impl ConfidenceReport {
    pub fn fallback(reason: &str) -> Self {
        Self {
            overall: 0.5,
            raw: 0.5,
            prior: 0.5,
            components: ConfidenceComponents {
                content: 0.5,
                consensus: 0.6,
                historical: 0.5,
                technical: 0.6,
                domain: 0.6,
            },
            weights: ComponentWeights::BASELINE,
            uncertainty: UncertaintyMetrics::new(0.3, 0.35),
            calibration: CalibrationMetrics::default(),
            explanation: fallback_explanation(reason),
            fallback_used: true,
        }
    }
}
