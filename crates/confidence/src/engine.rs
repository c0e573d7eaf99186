use std::sync::Arc;

use tracing::{debug, warn};

use ragconf_rag::RagContext;

use crate::bayesian::aggregate;
use crate::calibration::{CalibrationKey, Calibrator};
use crate::components::{
    average_entropy, consensus_score, content_score, domain_score, historical_score,
    technical_score, ConfidenceComponents,
};
use crate::config::CalibrationSettings;
use crate::context::{DocumentContext, DocumentContextInput, ModelPrediction, StructureContext};
use crate::error::{ensure_finite, ContextError, Result};
use crate::explanation::{explain, ExplanationInputs};
use crate::patterns::PatternStore;
use crate::reliability::ModelReliability;
use crate::report::ConfidenceReport;
use crate::uncertainty::quantify;

pub struct ConfidenceEngine {
    calibrator: Arc<Calibrator>,
    patterns: Arc<PatternStore>,
    reliability: ModelReliability,
}

impl Default for ConfidenceEngine {
    fn default() -> Self {
        Self::new(Arc::new(Calibrator::default()))
    }
}

impl ConfidenceEngine {
    pub fn new(calibrator: Arc<Calibrator>) -> Self {
        Self {
            calibrator,
            patterns: Arc::new(PatternStore::new()),
            reliability: ModelReliability::default(),
        }
    }

    pub fn from_settings(settings: &CalibrationSettings) -> anyhow::Result<Self> {
        let calibrator = match &settings.state_path {
            Some(path) => Calibrator::load(path, settings.min_bin_samples)?,
            None => Calibrator::new(settings.min_bin_samples),
        };
        let patterns = match settings.patterns_path() {
            Some(path) => PatternStore::load(&path)?,
            None => PatternStore::new(),
        };
        Ok(Self::new(Arc::new(calibrator)).with_patterns(Arc::new(patterns)))
    }

    /// Writes whatever `from_settings` would restore. Unset paths are skipped.
    pub fn save_state(&self, settings: &CalibrationSettings) -> anyhow::Result<()> {
        if let Some(path) = &settings.state_path {
            self.calibrator.save(path)?;
        }
        if let Some(path) = settings.patterns_path() {
            self.patterns.save(&path)?;
        }
        Ok(())
    }

    pub fn with_patterns(mut self, patterns: Arc<PatternStore>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_reliability(mut self, reliability: ModelReliability) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn calibrator(&self) -> &Arc<Calibrator> {
        &self.calibrator
    }

    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.patterns
    }

    /// Always returns a report; failures produce `ConfidenceReport::fallback`.
    pub fn compute_confidence(
        &self,
        predictions: &[ModelPrediction],
        context: &DocumentContext,
        rag: Option<&RagContext>,
        structure: Option<&StructureContext>,
    ) -> ConfidenceReport {
        match self.try_compute(predictions, context, rag, structure) {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    industry = %context.industry,
                    document_type = %context.document_type,
                    error = %err,
                    "confidence calculation failed; returning fallback report"
                );
                ConfidenceReport::fallback(&err.to_string())
            }
        }
    }

    pub fn compute_from_input(
        &self,
        predictions: &[ModelPrediction],
        input: DocumentContextInput,
        rag: Option<&RagContext>,
        structure: Option<&StructureContext>,
    ) -> std::result::Result<ConfidenceReport, ContextError> {
        let context = DocumentContext::try_from(input)?;
        Ok(self.compute_confidence(predictions, &context, rag, structure))
    }

    pub fn try_compute(
        &self,
        predictions: &[ModelPrediction],
        context: &DocumentContext,
        rag: Option<&RagContext>,
        structure: Option<&StructureContext>,
    ) -> Result<ConfidenceReport> {
        context.validate()?;
        for prediction in predictions {
            prediction.validate()?;
        }
        if let Some(structure) = structure {
            structure.validate()?;
        }
        if let Some(rag) = rag {
            ensure_finite("ragContext.averageSimilarity", rag.average_similarity)?;
        }

        let key = CalibrationKey::new(&context.industry, &context.document_type);
        let components = ConfidenceComponents {
            content: content_score(predictions, context),
            consensus: consensus_score(predictions),
            historical: historical_score(rag, self.patterns.learned(&key)),
            technical: technical_score(predictions, context, &self.reliability),
            domain: domain_score(predictions, context, structure),
        };
        for (name, value) in components.iter() {
            ensure_finite(name, value)?;
        }

        let aggregate = aggregate(&components, context, average_entropy(predictions));
        let uncertainty = quantify(predictions, context, &components);
        ensure_finite("posterior", aggregate.posterior)?;
        ensure_finite("total uncertainty", uncertainty.total)?;

        let overall = self
            .calibrator
            .calibrate(&key, aggregate.posterior, uncertainty.total);
        debug!(
            key = %key,
            raw = aggregate.posterior,
            overall,
            uncertainty = uncertainty.total,
            "confidence computed"
        );

        let explanation = explain(&ExplanationInputs {
            components: &components,
            uncertainty: &uncertainty,
            rag,
            structure,
            prediction_count: predictions.len(),
        });
        Ok(ConfidenceReport {
            overall,
            raw: aggregate.posterior,
            prior: aggregate.prior,
            components,
            weights: aggregate.weights,
            uncertainty,
            calibration: self.calibrator.metrics(&key),
            explanation,
            fallback_used: false,
        })
    }

    pub fn record_outcome(
        &self,
        context: &DocumentContext,
        predicted_confidence: f64,
        actual_accuracy: f64,
    ) -> Result<()> {
        let key = CalibrationKey::new(&context.industry, &context.document_type);
        self.calibrator
            .record(&key, predicted_confidence, actual_accuracy)?;
        self.patterns.record(key, actual_accuracy);
        Ok(())
    }
}
