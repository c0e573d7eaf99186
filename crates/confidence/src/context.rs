use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ContextError, Result};

pub const DEFAULT_TEXT_QUALITY: f64 = 0.7;
pub const DEFAULT_PROCESSING_COMPLEXITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionFeatures {
    pub text_quality: f64,
    pub structural_clarity: f64,
    pub domain_match: f64,
    pub processing_time: f64,
}

impl Default for PredictionFeatures {
    fn default() -> Self {
        Self {
            text_quality: 0.5,
            structural_clarity: 0.5,
            domain_match: 0.5,
            processing_time: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrediction {
    pub model: String,
    pub confidence: f64,
    pub entropy: f64,
    #[serde(default)]
    pub features: PredictionFeatures,
    #[serde(default)]
    pub latency_ms: f64,
}

impl ModelPrediction {
    pub fn new(model: impl Into<String>, confidence: f64, entropy: f64) -> Self {
        Self {
            model: model.into(),
            confidence,
            entropy,
            features: PredictionFeatures::default(),
            latency_ms: 0.0,
        }
    }

    pub fn with_features(mut self, features: PredictionFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let field = |name: &str| format!("prediction `{}` {name}", self.model);
        ensure_finite(&field("confidence"), self.confidence)?;
        ensure_finite(&field("entropy"), self.entropy)?;
        ensure_finite(&field("textQuality"), self.features.text_quality)?;
        ensure_finite(&field("structuralClarity"), self.features.structural_clarity)?;
        ensure_finite(&field("domainMatch"), self.features.domain_match)?;
        ensure_finite(&field("processingTime"), self.features.processing_time)?;
        ensure_finite(&field("latencyMs"), self.latency_ms)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContextInput {
    pub industry: Option<String>,
    pub document_type: Option<String>,
    pub text_quality: Option<f64>,
    pub processing_complexity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    pub industry: String,
    pub document_type: String,
    pub text_quality: f64,
    pub processing_complexity: f64,
}

impl DocumentContext {
    pub fn new(industry: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            document_type: document_type.into(),
            text_quality: DEFAULT_TEXT_QUALITY,
            processing_complexity: DEFAULT_PROCESSING_COMPLEXITY,
        }
    }

    pub fn with_text_quality(mut self, text_quality: f64) -> Self {
        self.text_quality = text_quality;
        self
    }

    pub fn with_processing_complexity(mut self, processing_complexity: f64) -> Self {
        self.processing_complexity = processing_complexity;
        self
    }

    pub fn is_general(&self) -> bool {
        ragconf_rag::is_general(&self.industry)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure_finite("documentContext.textQuality", self.text_quality)?;
        ensure_finite(
            "documentContext.processingComplexity",
            self.processing_complexity,
        )?;
        Ok(())
    }
}

impl TryFrom<DocumentContextInput> for DocumentContext {
    type Error = ContextError;

    fn try_from(input: DocumentContextInput) -> std::result::Result<Self, Self::Error> {
        let industry = required(input.industry, "industry")?;
        let document_type = required(input.document_type, "documentType")?;
        Ok(Self {
            industry,
            document_type,
            text_quality: input.text_quality.unwrap_or(DEFAULT_TEXT_QUALITY),
            processing_complexity: input
                .processing_complexity
                .unwrap_or(DEFAULT_PROCESSING_COMPLEXITY),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> std::result::Result<String, ContextError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ContextError::MissingField(field)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureContext {
    pub structure_score: f64,
    pub pattern_match: f64,
    pub adaptive_score: f64,
}

impl StructureContext {
    pub(crate) fn validate(&self) -> Result<()> {
        ensure_finite("structureContext.structureScore", self.structure_score)?;
        ensure_finite("structureContext.patternMatch", self.pattern_match)?;
        ensure_finite("structureContext.adaptiveScore", self.adaptive_score)?;
        Ok(())
    }
}
