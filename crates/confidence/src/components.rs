use serde::{Deserialize, Serialize};

use ragconf_rag::RagContext;

use crate::context::{DocumentContext, ModelPrediction, StructureContext};
use crate::patterns::{PatternStats, MIN_PATTERN_SAMPLES};
use crate::reliability::ModelReliability;

pub const CONTENT_RANGE: (f64, f64) = (0.1, 0.95);
pub const CONSENSUS_RANGE: (f64, f64) = (0.2, 0.95);
pub const HISTORICAL_RANGE: (f64, f64) = (0.2, 0.9);
pub const TECHNICAL_RANGE: (f64, f64) = (0.3, 0.95);
pub const DOMAIN_RANGE: (f64, f64) = (0.3, 0.9);

pub const SINGLE_MODEL_CONSENSUS: f64 = 0.6;
pub const NEUTRAL_AVERAGE: f64 = 0.5;

const LATENCY_THRESHOLD_MS: f64 = 5000.0;
const LATENCY_SPAN_MS: f64 = 10_000.0;
const MAX_LATENCY_PENALTY: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceComponents {
    pub content: f64,
    pub consensus: f64,
    pub historical: f64,
    pub technical: f64,
    pub domain: f64,
}

impl ConfidenceComponents {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("content", self.content),
            ("consensus", self.consensus),
            ("historical", self.historical),
            ("technical", self.technical),
            ("domain", self.domain),
        ]
        .into_iter()
    }
}

fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn confidences(predictions: &[ModelPrediction]) -> Vec<f64> {
    predictions.iter().map(|p| p.confidence).collect()
}

pub fn average_entropy(predictions: &[ModelPrediction]) -> f64 {
    mean(predictions.iter().map(|p| p.entropy)).unwrap_or(NEUTRAL_AVERAGE)
}

pub fn average_domain_match(predictions: &[ModelPrediction]) -> f64 {
    mean(predictions.iter().map(|p| p.features.domain_match)).unwrap_or(NEUTRAL_AVERAGE)
}

fn feature_score(prediction: &ModelPrediction) -> f64 {
    let f = &prediction.features;
    0.3 * f.text_quality + 0.3 * f.structural_clarity + 0.2 * f.domain_match
        + 0.2 * (1.0 - f.processing_time)
}

pub fn content_score(predictions: &[ModelPrediction], context: &DocumentContext) -> f64 {
    let features = mean(predictions.iter().map(feature_score)).unwrap_or(NEUTRAL_AVERAGE);
    let score = 0.5 + 0.4 * (context.text_quality - 0.5)
        - 0.2 * (context.processing_complexity - 0.5)
        + 0.3 * features;
    clamp(score, CONTENT_RANGE)
}

pub fn consensus_score(predictions: &[ModelPrediction]) -> f64 {
    if predictions.len() < 2 {
        return SINGLE_MODEL_CONSENSUS;
    }
    let mut agreement = 0.0;
    let mut pairs = 0usize;
    for (i, a) in predictions.iter().enumerate() {
        for b in &predictions[i + 1..] {
            agreement += 0.6 * (1.0 - (a.confidence - b.confidence).abs())
                + 0.4 * (1.0 - (a.entropy - b.entropy).abs());
            pairs += 1;
        }
    }
    let penalty = (2.0 * variance(&confidences(predictions))).min(0.3);
    clamp(agreement / pairs as f64 - penalty, CONSENSUS_RANGE)
}

/// Blends retrieved-document evidence and the learned pattern accuracy into a
/// 0.5 baseline. `pattern` is only consulted when it carries enough samples.
pub fn historical_score(rag: Option<&RagContext>, pattern: Option<PatternStats>) -> f64 {
    let mut score = 0.5;
    if let Some(rag) = rag {
        let sample_size = rag.sample_size();
        if sample_size > 0 {
            let weight = (sample_size as f64 / 10.0).min(1.0);
            let evidence = rag.historical_confidence().unwrap_or(NEUTRAL_AVERAGE)
                + 0.3 * rag.average_similarity;
            score = score * (1.0 - weight) + evidence * weight;
        }
    }
    if let Some(pattern) = pattern.filter(|p| p.sample_count >= MIN_PATTERN_SAMPLES) {
        let weight = (pattern.sample_count as f64 / 20.0).min(0.4);
        score = score * (1.0 - weight) + pattern.accuracy * weight;
    }
    clamp(score, HISTORICAL_RANGE)
}

/// Reliability-weighted mean confidence. Falls back to the plain mean when every
/// model has zero reliability, and to the neutral 0.8 with no predictions.
pub fn weighted_confidence(predictions: &[ModelPrediction], reliability: &ModelReliability) -> f64 {
    let (weighted, weights) = predictions.iter().fold((0.0, 0.0), |(sum, total), p| {
        let r = reliability.get(&p.model);
        (sum + r * p.confidence, total + r)
    });
    if weights > 0.0 {
        weighted / weights
    } else {
        mean(predictions.iter().map(|p| p.confidence)).unwrap_or(0.8)
    }
}

pub fn latency_penalty(predictions: &[ModelPrediction]) -> f64 {
    match mean(predictions.iter().map(|p| p.latency_ms)) {
        Some(avg) if avg > LATENCY_THRESHOLD_MS => {
            (MAX_LATENCY_PENALTY * (avg - LATENCY_THRESHOLD_MS) / LATENCY_SPAN_MS)
                .min(MAX_LATENCY_PENALTY)
        }
        _ => 0.0,
    }
}

pub fn technical_score(
    predictions: &[ModelPrediction],
    context: &DocumentContext,
    reliability: &ModelReliability,
) -> f64 {
    let score = 0.7 + 0.3 * (weighted_confidence(predictions, reliability) - 0.8)
        - latency_penalty(predictions)
        + 0.2 * (context.text_quality - 0.7);
    clamp(score, TECHNICAL_RANGE)
}

pub fn domain_score(
    predictions: &[ModelPrediction],
    context: &DocumentContext,
    structure: Option<&StructureContext>,
) -> f64 {
    let mut score = 0.6;
    if !context.is_general() {
        score += 0.1;
    }
    if let Some(s) = structure {
        score += 0.3 * (s.structure_score - 0.5)
            + 0.2 * (s.pattern_match - 0.5)
            + 0.3 * (s.adaptive_score - 0.5);
    }
    score += 0.2 * (average_domain_match(predictions) - 0.5);
    clamp(score, DOMAIN_RANGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PredictionFeatures;
    use proptest::prelude::*;

    fn prediction(confidence: f64, entropy: f64) -> ModelPrediction {
        ModelPrediction::new("gpt-4o", confidence, entropy)
    }

    #[test]
    fn consensus_defaults_with_one_prediction() {
        assert_eq!(consensus_score(&[]), SINGLE_MODEL_CONSENSUS);
        assert_eq!(consensus_score(&[prediction(0.2, 0.9)]), SINGLE_MODEL_CONSENSUS);
    }

    #[test]
    fn disagreement_lowers_consensus() {
        let agree = consensus_score(&[prediction(0.9, 0.2), prediction(0.88, 0.22)]);
        let disagree = consensus_score(&[prediction(0.9, 0.2), prediction(0.3, 0.8)]);
        assert!(agree > 0.9);
        assert!(disagree < 0.6);
    }

    #[test]
    fn content_uses_neutral_features_without_predictions() {
        let ctx = DocumentContext::new("finance", "invoice")
            .with_text_quality(0.5)
            .with_processing_complexity(0.5);
        assert!((content_score(&[], &ctx) - 0.65).abs() < 1e-12);
    }

    #[test]
    fn historical_blends_rag_and_pattern() {
        assert_eq!(historical_score(None, None), 0.5);
        let pattern = PatternStats {
            accuracy: 0.9,
            sample_count: 20,
        };
        // pattern weight caps at 0.4
        assert!((historical_score(None, Some(pattern)) - 0.66).abs() < 1e-12);
        let thin = PatternStats {
            accuracy: 0.9,
            sample_count: 4,
        };
        assert_eq!(historical_score(None, Some(thin)), 0.5);
    }

    #[test]
    fn slow_models_lose_technical_confidence() {
        let ctx = DocumentContext::new("finance", "invoice");
        let fast = [prediction(0.8, 0.3)];
        let slow = [prediction(0.8, 0.3).with_latency_ms(10_000.0)];
        let reliability = ModelReliability::default();
        assert!((technical_score(&fast, &ctx, &reliability) - 0.7).abs() < 1e-12);
        assert!((technical_score(&slow, &ctx, &reliability) - 0.6).abs() < 1e-12);
        assert_eq!(latency_penalty(&[prediction(0.8, 0.3).with_latency_ms(60_000.0)]), 0.2);
    }

    #[test]
    fn reliability_weights_favour_trusted_models() {
        let reliability = ModelReliability::empty(0.8)
            .with_model("trusted", 1.0)
            .with_model("shaky", 0.0);
        let predictions = [
            ModelPrediction::new("trusted", 0.9, 0.2),
            ModelPrediction::new("shaky", 0.1, 0.2),
        ];
        assert!((weighted_confidence(&predictions, &reliability) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn domain_rewards_specific_industries_and_structure() {
        let general = DocumentContext::new("general", "memo");
        let finance = DocumentContext::new("finance", "invoice");
        assert!((domain_score(&[], &general, None) - 0.6).abs() < 1e-12);
        assert!((domain_score(&[], &finance, None) - 0.7).abs() < 1e-12);
        let structure = StructureContext {
            structure_score: 1.0,
            pattern_match: 1.0,
            adaptive_score: 1.0,
        };
        assert_eq!(domain_score(&[], &finance, Some(&structure)), DOMAIN_RANGE.1);
    }

    fn unit() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    fn any_prediction() -> impl Strategy<Value = ModelPrediction> {
        (unit(), unit(), unit(), unit(), unit(), unit(), 0.0f64..60_000.0).prop_map(
            |(confidence, entropy, tq, sc, dm, pt, latency)| {
                ModelPrediction::new("textract", confidence, entropy)
                    .with_features(PredictionFeatures {
                        text_quality: tq,
                        structural_clarity: sc,
                        domain_match: dm,
                        processing_time: pt,
                    })
                    .with_latency_ms(latency)
            },
        )
    }

    proptest! {
        #[test]
        fn components_stay_in_range(
            predictions in prop::collection::vec(any_prediction(), 0..6),
            tq in unit(),
            complexity in unit(),
            structure in (unit(), unit(), unit()),
        ) {
            let ctx = DocumentContext::new("legal", "contract")
                .with_text_quality(tq)
                .with_processing_complexity(complexity);
            let structure = StructureContext {
                structure_score: structure.0,
                pattern_match: structure.1,
                adaptive_score: structure.2,
            };
            let reliability = ModelReliability::default();
            let in_range = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
            prop_assert!(in_range(content_score(&predictions, &ctx), CONTENT_RANGE));
            prop_assert!(in_range(consensus_score(&predictions), CONSENSUS_RANGE));
            prop_assert!(in_range(historical_score(None, None), HISTORICAL_RANGE));
            prop_assert!(in_range(technical_score(&predictions, &ctx, &reliability), TECHNICAL_RANGE));
            prop_assert!(in_range(domain_score(&predictions, &ctx, Some(&structure)), DOMAIN_RANGE));
        }
    }
}
