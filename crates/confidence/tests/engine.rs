use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;
use ragconf_confidence::{
    bin_index, CalibrationKey, CalibrationSettings, Calibrator, ConfidenceEngine,
    ContextError, DocumentContext, DocumentContextInput, ModelPrediction, PredictionFeatures,
    StructureContext, FALLBACK_MARKER, OVERALL_RANGE,
};
use ragconf_core::{ChunkConfig, DocumentRecord, HashVectorizer};
use ragconf_rag::{ChunkStore, HybridRetriever, InMemorySource, IndexBuilder, RetrievalSettings};

fn invoice_context() -> DocumentContext {
    DocumentContext::new("finance", "invoice")
        .with_text_quality(0.85)
        .with_processing_complexity(0.4)
}

fn features() -> PredictionFeatures {
    PredictionFeatures {
        text_quality: 0.85,
        structural_clarity: 0.8,
        domain_match: 0.9,
        processing_time: 0.2,
    }
}

#[test]
fn agreeing_models_reach_high_consensus() {
    let engine = ConfidenceEngine::default();
    let predictions = [
        ModelPrediction::new("gpt-4o", 0.90, 0.20).with_features(features()),
        ModelPrediction::new("claude-3-5-sonnet", 0.91, 0.21).with_features(features()),
        ModelPrediction::new("gemini-1.5-pro", 0.89, 0.20).with_features(features()),
    ];
    let report = engine.compute_confidence(&predictions, &invoice_context(), None, None);
    assert!(!report.fallback_used);
    assert!(report.components.consensus > 0.8);
    assert!(report
        .explanation
        .confidence_boosts
        .iter()
        .any(|boost| boost.factor.contains("agreement")));
}

#[test]
fn calibration_bin_pulls_toward_observed_accuracy() {
    let calibrator = Calibrator::default();
    let key = CalibrationKey::new("finance", "invoice");
    for _ in 0..50 {
        calibrator.record(&key, 0.85, 0.85).unwrap();
    }
    let bin = calibrator.lookup(&key, 0.83).unwrap();
    assert_eq!(bin.sample_count, 50);
    assert!((bin.actual_accuracy - 0.85).abs() < 1e-9);

    let uncertainty: f64 = 0.3;
    let expected = (0.83 + 0.3 * 0.02 - 0.15 * uncertainty).clamp(0.1, 0.95);
    assert!((calibrator.calibrate(&key, 0.83, uncertainty) - expected).abs() < 1e-9);

    let other = CalibrationKey::new("legal", "contract");
    let uncalibrated = (0.83 - 0.1 * uncertainty).clamp(0.1, 0.95);
    assert!((calibrator.calibrate(&other, 0.83, uncertainty) - uncalibrated).abs() < 1e-12);
}

#[test]
fn engine_applies_the_calibration_bin_of_its_raw_score() {
    let engine = ConfidenceEngine::default();
    let ctx = invoice_context();
    let predictions = [ModelPrediction::new("textract", 0.8, 0.3).with_features(features())];
    let before = engine.compute_confidence(&predictions, &ctx, None, None);

    let key = CalibrationKey::new("finance", "invoice");
    for _ in 0..50 {
        engine.calibrator().record(&key, before.raw, 0.85).unwrap();
    }
    let after = engine.compute_confidence(&predictions, &ctx, None, None);
    assert_eq!(after.raw, before.raw);
    let expected = (after.raw + 0.3 * (0.85 - after.raw) - 0.15 * after.uncertainty.total)
        .clamp(0.1, 0.95);
    assert!((after.overall - expected).abs() < 1e-9);
    assert_eq!(bin_index(after.raw), bin_index(before.raw));
}

#[test]
fn empty_predictions_still_produce_a_report() {
    let engine = ConfidenceEngine::default();
    let report = engine.compute_confidence(&[], &invoice_context(), None, None);
    assert!(!report.fallback_used);
    assert_eq!(report.components.consensus, 0.6);
    assert!(report.overall >= OVERALL_RANGE.0 && report.overall <= OVERALL_RANGE.1);
    assert!(report.uncertainty.total > 0.0);
}

#[test]
fn non_finite_inputs_fall_back() {
    let engine = ConfidenceEngine::default();
    let structure = StructureContext {
        structure_score: f64::NAN,
        pattern_match: 0.9,
        adaptive_score: 0.5,
    };
    let report = engine.compute_confidence(&[], &invoice_context(), None, Some(&structure));
    assert!(report.fallback_used);
    assert_eq!(report.overall, 0.5);
    assert_eq!(report.components.consensus, 0.6);
    assert_eq!(report.uncertainty.aleatoric, 0.3);
    assert_eq!(report.uncertainty.epistemic, 0.35);
    assert!(report.explanation.uncertainty_factors[0].contains(FALLBACK_MARKER));
}

#[test]
fn missing_document_type_is_rejected_up_front() {
    let engine = ConfidenceEngine::default();
    let input = DocumentContextInput {
        industry: Some("finance".into()),
        ..Default::default()
    };
    assert_eq!(
        engine.compute_from_input(&[], input, None, None),
        Err(ContextError::MissingField("documentType"))
    );
}

#[test]
fn feedback_strengthens_historical_component() {
    let engine = ConfidenceEngine::default();
    let ctx = invoice_context();
    let before = engine.compute_confidence(&[], &ctx, None, None);
    for _ in 0..20 {
        engine.record_outcome(&ctx, 0.8, 1.0).unwrap();
    }
    let after = engine.compute_confidence(&[], &ctx, None, None);
    assert_eq!(before.components.historical, 0.5);
    assert!((after.components.historical - 0.7).abs() < 1e-9);
}

#[test]
fn retrieved_documents_feed_historical_component() {
    let documents = vec![DocumentRecord {
        document_id: "fin-invoice".to_string(),
        title: None,
        extracted_text: "invoice payment terms net thirty days from the invoice date".to_string(),
        industry: "finance".to_string(),
        document_type: "invoice".to_string(),
        entity_types: Default::default(),
        confidence: 0.9,
        created_at: Utc::now(),
    }];
    let store = Arc::new(ChunkStore::new(
        Arc::new(HashVectorizer::default()),
        ChunkConfig::default(),
    ));
    let retriever = HybridRetriever::new(store, RetrievalSettings::default())
        .with_source(Arc::new(InMemorySource::new(documents)), IndexBuilder::default());
    let rag = retriever.retrieve("invoice payment terms", "finance", None, 5);
    assert_eq!(rag.sample_size(), 1);

    let engine = ConfidenceEngine::default();
    let with_rag = engine.compute_confidence(&[], &invoice_context(), Some(&rag), None);
    let without = engine.compute_confidence(&[], &invoice_context(), None, None);
    assert!(with_rag.components.historical > without.components.historical);
}

#[test]
fn concurrent_feedback_for_one_key_is_not_lost() {
    let engine = Arc::new(ConfidenceEngine::default());
    let ctx = invoice_context();
    std::thread::scope(|scope| {
        for worker in 0..8 {
            let engine = Arc::clone(&engine);
            let ctx = ctx.clone();
            scope.spawn(move || {
                for i in 0..250 {
                    let actual = if (worker + i) % 2 == 0 { 1.0 } else { 0.0 };
                    engine.record_outcome(&ctx, 0.84, actual).unwrap();
                }
            });
        }
    });
    let key = CalibrationKey::new("finance", "invoice");
    let bins = engine.calibrator().bins(&key);
    assert_eq!(bins.len(), 1);
    assert_eq!(bins[0].sample_count, 2000);
    assert!((bins[0].actual_accuracy - 0.5).abs() < 1e-9);
    assert_eq!(engine.patterns().get(&key).unwrap().sample_count, 2000);
}

#[test]
fn engine_restores_saved_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let settings = CalibrationSettings {
        min_bin_samples: 10,
        state_path: Some(path.clone()),
        ..Default::default()
    };
    let engine = ConfidenceEngine::from_settings(&settings).unwrap();
    let ctx = invoice_context();
    for _ in 0..12 {
        engine.record_outcome(&ctx, 0.72, 0.9).unwrap();
    }
    engine.save_state(&settings).unwrap();

    let restored = ConfidenceEngine::from_settings(&settings).unwrap();
    let key = CalibrationKey::new("finance", "invoice");
    assert_eq!(
        restored.calibrator().bins(&key),
        engine.calibrator().bins(&key)
    );
}

#[test]
fn restored_engine_keeps_learned_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let settings = CalibrationSettings {
        state_path: Some(dir.path().join("calibration.json")),
        ..Default::default()
    };
    let ctx = invoice_context();
    let fresh = ConfidenceEngine::from_settings(&settings).unwrap();
    assert_eq!(
        fresh.compute_confidence(&[], &ctx, None, None).components.historical,
        0.5
    );
    for _ in 0..5 {
        let engine = ConfidenceEngine::from_settings(&settings).unwrap();
        engine.record_outcome(&ctx, 0.8, 1.0).unwrap();
        engine.save_state(&settings).unwrap();
    }
    assert!(dir.path().join("calibration.patterns.json").exists());

    let restored = ConfidenceEngine::from_settings(&settings).unwrap();
    let key = CalibrationKey::new("finance", "invoice");
    assert_eq!(restored.patterns().get(&key).unwrap().sample_count, 5);
    let report = restored.compute_confidence(&[], &ctx, None, None);
    assert!((report.components.historical - 0.625).abs() < 1e-9);
}

fn unit() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

fn prediction() -> impl Strategy<Value = ModelPrediction> {
    (
        prop::sample::select(vec!["gpt-4o", "tesseract", "unknown-model"]),
        unit(),
        unit(),
        (unit(), unit(), unit(), unit()),
        0.0f64..30_000.0,
    )
        .prop_map(|(model, confidence, entropy, (tq, sc, dm, pt), latency)| {
            ModelPrediction::new(model, confidence, entropy)
                .with_features(PredictionFeatures {
                    text_quality: tq,
                    structural_clarity: sc,
                    domain_match: dm,
                    processing_time: pt,
                })
                .with_latency_ms(latency)
        })
}

proptest! {
    #[test]
    fn overall_confidence_stays_in_range(
        predictions in prop::collection::vec(prediction(), 0..5),
        industry in prop::sample::select(vec!["finance", "general", "medical", "aerospace"]),
        document_type in prop::sample::select(vec!["invoice", "contract", "memo"]),
        tq in unit(),
        complexity in unit(),
        structure in prop::option::of((unit(), unit(), unit())),
    ) {
        let engine = ConfidenceEngine::default();
        let ctx = DocumentContext::new(industry, document_type)
            .with_text_quality(tq)
            .with_processing_complexity(complexity);
        let structure = structure.map(|(s, p, a)| StructureContext {
            structure_score: s,
            pattern_match: p,
            adaptive_score: a,
        });
        let report = engine.compute_confidence(&predictions, &ctx, None, structure.as_ref());
        prop_assert!(!report.fallback_used);
        prop_assert!(report.overall >= OVERALL_RANGE.0 && report.overall <= OVERALL_RANGE.1);
        prop_assert!(report.raw >= OVERALL_RANGE.0 && report.raw <= OVERALL_RANGE.1);
        let u = report.uncertainty;
        prop_assert!(u.aleatoric >= 0.05 && u.aleatoric <= 0.8);
        prop_assert!(u.epistemic >= 0.05 && u.epistemic <= 0.7);
    }
}
