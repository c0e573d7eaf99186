use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const DEFAULT_RELIABILITY: f64 = 0.8;

static BUILTIN: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4o", 0.92),
        ("gpt-4o-mini", 0.85),
        ("claude-3-5-sonnet", 0.93),
        ("claude-3-haiku", 0.84),
        ("gemini-1.5-pro", 0.88),
        ("gemini-1.5-flash", 0.82),
        ("tesseract", 0.72),
        ("textract", 0.86),
    ])
});

#[derive(Debug, Clone)]
pub struct ModelReliability {
    table: HashMap<String, f64>,
    default: f64,
}

impl Default for ModelReliability {
    fn default() -> Self {
        Self {
            table: BUILTIN
                .iter()
                .map(|(model, value)| (model.to_string(), *value))
                .collect(),
            default: DEFAULT_RELIABILITY,
        }
    }
}

impl ModelReliability {
    pub fn empty(default: f64) -> Self {
        Self {
            table: HashMap::new(),
            default,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, reliability: f64) -> Self {
        self.table
            .insert(model.into().to_ascii_lowercase(), reliability.clamp(0.0, 1.0));
        self
    }

    pub fn get(&self, model: &str) -> f64 {
        self.table
            .get(model.trim().to_ascii_lowercase().as_str())
            .copied()
            .unwrap_or(self.default)
    }
}
