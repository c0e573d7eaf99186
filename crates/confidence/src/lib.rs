pub mod bayesian;
pub mod calibration;
pub mod components;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod explanation;
pub mod patterns;
pub mod reliability;
pub mod report;
pub mod uncertainty;

pub use bayesian::{aggregate, Aggregate, ComponentWeights, OVERALL_RANGE};
pub use calibration::{
    bin_index, CalibrationBin, CalibrationKey, CalibrationMetrics, Calibrator,
    DEFAULT_MIN_BIN_SAMPLES,
};
pub use components::ConfidenceComponents;
pub use config::CalibrationSettings;
pub use context::{
    DocumentContext, DocumentContextInput, ModelPrediction, PredictionFeatures, StructureContext,
};
pub use engine::ConfidenceEngine;
pub use error::{ConfidenceError, ContextError, Result};
pub use explanation::{ConfidenceBoost, Explanation, FALLBACK_MARKER};
pub use patterns::{PatternStats, PatternStore};
pub use reliability::ModelReliability;
pub use report::ConfidenceReport;
pub use uncertainty::UncertaintyMetrics;
