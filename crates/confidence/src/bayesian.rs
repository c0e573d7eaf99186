use serde::{Deserialize, Serialize};

use crate::components::ConfidenceComponents;
use crate::context::DocumentContext;

pub const OVERALL_RANGE: (f64, f64) = (0.1, 0.98);
const PRIOR_RANGE: (f64, f64) = (0.5, 0.9);
const GENERAL_PRIOR: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentWeights {
    pub content: f64,
    pub consensus: f64,
    pub historical: f64,
    pub technical: f64,
    pub domain: f64,
}

impl ComponentWeights {
    pub const BASELINE: Self = Self {
        content: 0.25,
        consensus: 0.25,
        historical: 0.20,
        technical: 0.15,
        domain: 0.15,
    };

    pub fn adapted(components: &ConfidenceComponents, is_general: bool) -> Self {
        let mut weights = Self::BASELINE;
        if components.consensus > 0.8 {
            weights.consensus += 0.1;
        }
        if components.historical > 0.8 {
            weights.historical += 0.1;
        }
        if !is_general && components.domain > 0.7 {
            weights.domain += 0.1;
        }
        weights.normalized()
    }

    fn total(&self) -> f64 {
        self.content + self.consensus + self.historical + self.technical + self.domain
    }

    fn normalized(self) -> Self {
        let total = self.total();
        Self {
            content: self.content / total,
            consensus: self.consensus / total,
            historical: self.historical / total,
            technical: self.technical / total,
            domain: self.domain / total,
        }
    }

    pub fn likelihood(&self, c: &ConfidenceComponents) -> f64 {
        self.content * c.content
            + self.consensus * c.consensus
            + self.historical * c.historical
            + self.technical * c.technical
            + self.domain * c.domain
    }
}

pub fn industry_prior(industry: &str) -> f64 {
    match industry.trim().to_ascii_lowercase().as_str() {
        "medical" => 0.75,
        "legal" => 0.80,
        "finance" => 0.82,
        "logistics" => 0.70,
        "real_estate" => 0.72,
        _ => GENERAL_PRIOR,
    }
}

pub fn document_type_prior(document_type: &str) -> f64 {
    match document_type.trim().to_ascii_lowercase().as_str() {
        "contract" => 0.06,
        "invoice" | "bank_statement" | "lease" => 0.05,
        "medical_record" | "bill_of_lading" => 0.04,
        "receipt" => 0.03,
        "report" => 0.02,
        _ => 0.0,
    }
}

pub fn prior(context: &DocumentContext) -> f64 {
    let (lo, hi) = PRIOR_RANGE;
    (industry_prior(&context.industry) + document_type_prior(&context.document_type)).clamp(lo, hi)
}

pub fn posterior(likelihood: f64, prior: f64) -> f64 {
    let evidence = likelihood * prior + (1.0 - likelihood) * (1.0 - prior);
    if evidence <= 0.0 {
        return prior;
    }
    likelihood * prior / evidence
}

pub fn entropy_bonus(average_entropy: f64) -> f64 {
    (0.5 - average_entropy).max(0.0) * 0.1
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub weights: ComponentWeights,
    pub prior: f64,
    pub likelihood: f64,
    pub posterior: f64,
}

pub fn aggregate(
    components: &ConfidenceComponents,
    context: &DocumentContext,
    average_entropy: f64,
) -> Aggregate {
    let weights = ComponentWeights::adapted(components, context.is_general());
    let prior = prior(context);
    let likelihood = weights.likelihood(components);
    let (lo, hi) = OVERALL_RANGE;
    let posterior =
        (posterior(likelihood, prior) + entropy_bonus(average_entropy)).clamp(lo, hi);
    Aggregate {
        weights,
        prior,
        likelihood,
        posterior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(v: f64) -> ConfidenceComponents {
        ConfidenceComponents {
            content: v,
            consensus: v,
            historical: v,
            technical: v,
            domain: v,
        }
    }

    #[test]
    fn baseline_weights_sum_to_one() {
        assert!((ComponentWeights::BASELINE.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strong_signals_shift_weight_and_renormalize() {
        let weights = ComponentWeights::adapted(&components(0.9), false);
        assert!((weights.total() - 1.0).abs() < 1e-12);
        assert!((weights.consensus - 0.35 / 1.3).abs() < 1e-12);
        assert!((weights.technical - 0.15 / 1.3).abs() < 1e-12);

        let general = ComponentWeights::adapted(&components(0.9), true);
        assert!((general.domain - 0.15 / 1.2).abs() < 1e-12);
    }

    #[test]
    fn priors_follow_industry_and_document_type() {
        let ctx = DocumentContext::new("finance", "contract");
        assert!((prior(&ctx) - 0.88).abs() < 1e-12);
        let ctx = DocumentContext::new("unknown", "unknown");
        assert_eq!(prior(&ctx), GENERAL_PRIOR);
    }

    #[test]
    fn posterior_of_neutral_likelihood_is_the_prior() {
        assert!((posterior(0.5, 0.82) - 0.82).abs() < 1e-12);
        assert!(posterior(0.9, 0.65) > 0.9);
    }

    #[test]
    fn low_entropy_earns_a_bonus() {
        assert_eq!(entropy_bonus(0.7), 0.0);
        assert!((entropy_bonus(0.1) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn aggregate_is_clamped() {
        let ctx = DocumentContext::new("finance", "contract");
        let high = aggregate(&components(0.95), &ctx, 0.0);
        assert_eq!(high.posterior, OVERALL_RANGE.1);
        let low = aggregate(&components(0.1), &DocumentContext::new("general", "memo"), 1.0);
        assert!(low.posterior >= OVERALL_RANGE.0);
    }
}
