use serde::{Deserialize, Serialize};

use ragconf_rag::RagContext;

use crate::components::ConfidenceComponents;
use crate::context::StructureContext;
use crate::uncertainty::UncertaintyMetrics;

pub const FALLBACK_MARKER: &str = "fallback used";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBoost {
    pub factor: String,
    pub impact: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub primary_factors: Vec<String>,
    pub uncertainty_factors: Vec<String>,
    pub confidence_boosts: Vec<ConfidenceBoost>,
    pub recommendations: Vec<String>,
}

pub struct ExplanationInputs<'a> {
    pub components: &'a ConfidenceComponents,
    pub uncertainty: &'a UncertaintyMetrics,
    pub rag: Option<&'a RagContext>,
    pub structure: Option<&'a StructureContext>,
    pub prediction_count: usize,
}

fn describe(component: &str) -> &'static str {
    match component {
        "content" => "content quality",
        "consensus" => "model consensus",
        "historical" => "historical accuracy",
        "technical" => "technical reliability",
        _ => "domain fit",
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn explain(inputs: &ExplanationInputs<'_>) -> Explanation {
    let c = inputs.components;
    let u = inputs.uncertainty;
    let mut explanation = Explanation::default();

    for (name, value) in c.iter() {
        if value > 0.8 {
            explanation
                .primary_factors
                .push(format!("High {} ({value:.2})", describe(name)));
        } else if value < 0.5 {
            explanation
                .uncertainty_factors
                .push(format!("Low {} ({value:.2})", describe(name)));
        }
    }
    if u.aleatoric > 0.4 {
        explanation.uncertainty_factors.push(format!(
            "Noisy or complex input document (aleatoric {:.2})",
            u.aleatoric
        ));
    }
    if u.epistemic > 0.4 {
        explanation.uncertainty_factors.push(format!(
            "Limited model agreement or evidence (epistemic {:.2})",
            u.epistemic
        ));
    }

    if let Some(rag) = inputs.rag.filter(|rag| rag.average_similarity > 0.7) {
        explanation.confidence_boosts.push(ConfidenceBoost {
            factor: format!(
                "{} similar historical document(s) (similarity {:.2})",
                rag.sample_size(),
                rag.average_similarity
            ),
            impact: round2(0.05 + 0.15 * (rag.average_similarity - 0.7)),
        });
    }
    if let Some(structure) = inputs.structure.filter(|s| s.pattern_match > 0.8) {
        explanation.confidence_boosts.push(ConfidenceBoost {
            factor: format!(
                "Document layout matches a known pattern ({:.2})",
                structure.pattern_match
            ),
            impact: round2(0.05 + 0.1 * (structure.pattern_match - 0.8)),
        });
    }
    if c.consensus > 0.8 {
        explanation.confidence_boosts.push(ConfidenceBoost {
            factor: format!("Strong agreement between models ({:.2})", c.consensus),
            impact: round2(0.05 + 0.1 * (c.consensus - 0.8)),
        });
    }

    if c.technical < 0.6 {
        explanation.recommendations.push(
            "Re-process the document with a higher-quality scan or a more reliable extraction model"
                .to_string(),
        );
    }
    if c.consensus < 0.6 && inputs.prediction_count > 1 {
        explanation.recommendations.push(
            "Models disagree on this extraction; route it to human review or add a tie-breaking model"
                .to_string(),
        );
    }
    if c.historical < 0.5 {
        explanation.recommendations.push(
            "Few comparable historical documents; add verified examples of this document type"
                .to_string(),
        );
    }
    if u.total > 0.4 {
        explanation.recommendations.push(format!(
            "Overall uncertainty is high ({:.2}); manually verify the key extracted fields",
            u.total
        ));
    }
    explanation
}

pub fn fallback_explanation(reason: &str) -> Explanation {
    Explanation {
        primary_factors: Vec::new(),
        uncertainty_factors: vec![format!("Confidence calculation {FALLBACK_MARKER}: {reason}")],
        confidence_boosts: Vec::new(),
        recommendations: vec![
            "Manually verify the extracted fields; the confidence score is a conservative default"
                .to_string(),
        ],
    }
}
