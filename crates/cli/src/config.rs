use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use ragconf_confidence::CalibrationSettings;
use ragconf_rag::{EmbeddingProvider, RagConfig, SummarizerProvider};

pub const DEFAULT_CONFIG: &str = "ragconf.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub rag: RagConfig,
    pub calibration: CalibrationSettings,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&contents).map_err(|e| anyhow!("invalid config: {e}"))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(name) = lookup("RAGCONF_EMBEDDING_PROVIDER") {
            self.rag.embedding.provider = EmbeddingProvider::from_str(&name)
                .ok_or_else(|| anyhow!(format!("unknown embedding provider {name}")))?;
        }
        if let Some(value) = lookup("RAGCONF_EMBEDDING_DIMENSIONS") {
            self.rag.embedding.dimensions = value
                .parse()
                .with_context(|| format!("invalid RAGCONF_EMBEDDING_DIMENSIONS {value}"))?;
        }
        if let Some(name) = lookup("RAGCONF_SUMMARIZER_PROVIDER") {
            self.rag.summarizer.provider = SummarizerProvider::from_str(&name)
                .ok_or_else(|| anyhow!(format!("unknown summarizer provider {name}")))?;
        }
        if let Some(path) = lookup("RAGCONF_CALIBRATION_STATE").filter(|v| !v.is_empty()) {
            self.calibration.state_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("RAGCONF_PATTERNS_STATE").filter(|v| !v.is_empty()) {
            self.calibration.patterns_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}
