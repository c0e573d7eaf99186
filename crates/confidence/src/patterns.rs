use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context as _;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::CalibrationKey;

pub const MIN_PATTERN_SAMPLES: u64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStats {
    pub accuracy: f64,
    pub sample_count: u64,
}

impl PatternStats {
    fn observe(&mut self, actual: f64) {
        let n = self.sample_count as f64;
        self.accuracy = (self.accuracy * n + actual) / (n + 1.0);
        self.sample_count += 1;
    }
}

#[derive(Debug, Default)]
pub struct PatternStore {
    patterns: RwLock<HashMap<CalibrationKey, PatternStats>>,
}

#[derive(Serialize, Deserialize)]
struct KeyedPattern {
    #[serde(flatten)]
    key: CalibrationKey,
    #[serde(flatten)]
    stats: PatternStats,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CalibrationKey) -> Option<PatternStats> {
        self.patterns.read().get(key).copied()
    }

    pub fn learned(&self, key: &CalibrationKey) -> Option<PatternStats> {
        self.get(key)
            .filter(|stats| stats.sample_count >= MIN_PATTERN_SAMPLES)
    }

    pub fn record(&self, key: CalibrationKey, actual: f64) {
        self.patterns
            .write()
            .entry(key)
            .or_default()
            .observe(actual.clamp(0.0, 1.0));
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut snapshot: Vec<KeyedPattern> = self
            .patterns
            .read()
            .iter()
            .map(|(key, stats)| KeyedPattern {
                key: key.clone(),
                stats: *stats,
            })
            .collect();
        snapshot.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), keys = snapshot.len(), "pattern state saved");
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let snapshot: Vec<KeyedPattern> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse pattern state {}", path.display()))?;
        store.patterns.write().extend(
            snapshot
                .into_iter()
                .map(|KeyedPattern { key, stats }| (key, stats)),
        );
        info!(path = %path.display(), keys = store.len(), "pattern state loaded");
        Ok(store)
    }
}
