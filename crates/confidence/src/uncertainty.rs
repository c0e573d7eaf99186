use serde::{Deserialize, Serialize};

use crate::components::{average_entropy, confidences, variance, ConfidenceComponents};
use crate::context::{DocumentContext, ModelPrediction};

pub const ALEATORIC_RANGE: (f64, f64) = (0.05, 0.8);
pub const EPISTEMIC_RANGE: (f64, f64) = (0.05, 0.7);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertaintyMetrics {
    pub aleatoric: f64,
    pub epistemic: f64,
    pub total: f64,
}

impl UncertaintyMetrics {
    pub fn new(aleatoric: f64, epistemic: f64) -> Self {
        Self {
            aleatoric,
            epistemic,
            total: combine(aleatoric, epistemic),
        }
    }
}

pub fn combine(aleatoric: f64, epistemic: f64) -> f64 {
    (aleatoric.powi(2) + epistemic.powi(2)).sqrt()
}

pub fn aleatoric(context: &DocumentContext, components: &ConfidenceComponents) -> f64 {
    let (lo, hi) = ALEATORIC_RANGE;
    (0.2 + 0.3 * (1.0 - context.text_quality)
        + 0.2 * context.processing_complexity
        + 0.15 * (1.0 - components.content)
        + 0.15 * (1.0 - components.technical))
        .clamp(lo, hi)
}

pub fn epistemic(predictions: &[ModelPrediction], components: &ConfidenceComponents) -> f64 {
    let (lo, hi) = EPISTEMIC_RANGE;
    (0.15 + 0.4 * variance(&confidences(predictions))
        + 0.25 * (1.0 - components.consensus)
        + 0.2 * (1.0 - components.historical)
        + 0.15 * average_entropy(predictions))
        .clamp(lo, hi)
}

pub fn quantify(
    predictions: &[ModelPrediction],
    context: &DocumentContext,
    components: &ConfidenceComponents,
) -> UncertaintyMetrics {
    UncertaintyMetrics::new(
        aleatoric(context, components),
        epistemic(predictions, components),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn total_is_the_euclidean_norm() {
        let metrics = UncertaintyMetrics::new(0.3, 0.4);
        assert!((metrics.total - 0.5).abs() < 1e-12);
    }

    #[test]
    fn poor_input_raises_aleatoric() {
        let components = ConfidenceComponents {
            content: 0.8,
            consensus: 0.8,
            historical: 0.8,
            technical: 0.8,
            domain: 0.8,
        };
        let clean = DocumentContext::new("finance", "invoice").with_text_quality(0.95);
        let noisy = clean.clone().with_text_quality(0.2).with_processing_complexity(0.9);
        assert!(aleatoric(&noisy, &components) > aleatoric(&clean, &components));
    }

    proptest! {
        #[test]
        fn total_is_monotone_in_each_argument(
            a in 0.0f64..1.0,
            e in 0.0f64..1.0,
            delta in 0.0f64..1.0,
        ) {
            prop_assert!(combine(a + delta, e) >= combine(a, e));
            prop_assert!(combine(a, e + delta) >= combine(a, e));
            prop_assert!((UncertaintyMetrics::new(a, e).total - (a * a + e * e).sqrt()).abs() < 1e-12);
        }
    }
}
