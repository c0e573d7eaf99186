use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ensure_finite, Result};

pub const BIN_COUNT: usize = 10;
pub const BIN_WIDTH: f64 = 1.0 / BIN_COUNT as f64;
pub const DEFAULT_MIN_BIN_SAMPLES: u64 = 10;

pub const DEFAULT_RELIABILITY_METRIC: f64 = 0.7;
pub const DEFAULT_SHARPNESS: f64 = 0.6;
pub const DEFAULT_BRIER: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationKey {
    pub industry: String,
    pub document_type: String,
}

impl CalibrationKey {
    pub fn new(industry: &str, document_type: &str) -> Self {
        Self {
            industry: industry.trim().to_ascii_lowercase(),
            document_type: document_type.trim().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for CalibrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.industry, self.document_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub actual_accuracy: f64,
    pub sample_count: u64,
    pub reliability: f64,
}

impl CalibrationBin {
    fn empty(index: usize) -> Self {
        let lower = index as f64 * BIN_WIDTH;
        Self {
            lower,
            upper: lower + BIN_WIDTH,
            actual_accuracy: 0.0,
            sample_count: 0,
            reliability: 0.0,
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    fn index(&self) -> usize {
        bin_index(self.midpoint())
    }

    fn observe(&mut self, actual: f64) {
        let n = self.sample_count as f64;
        self.actual_accuracy = (self.actual_accuracy * n + actual) / (n + 1.0);
        self.sample_count += 1;
        self.reliability = (self.actual_accuracy - self.midpoint()).abs();
    }
}

/// Index of the 0.1-wide bin holding `confidence`; 1.0 lands in the top bin.
pub fn bin_index(confidence: f64) -> usize {
    let scaled = (confidence.clamp(0.0, 1.0) * BIN_COUNT as f64).floor() as usize;
    scaled.min(BIN_COUNT - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationMetrics {
    pub reliability: f64,
    pub sharpness: f64,
    pub brier_score: f64,
}

impl Default for CalibrationMetrics {
    fn default() -> Self {
        Self {
            reliability: DEFAULT_RELIABILITY_METRIC,
            sharpness: DEFAULT_SHARPNESS,
            brier_score: DEFAULT_BRIER,
        }
    }
}

impl CalibrationMetrics {
    fn from_bins(bins: &[CalibrationBin]) -> Self {
        let total: u64 = bins.iter().map(|bin| bin.sample_count).sum();
        if total == 0 {
            return Self::default();
        }
        Self {
            reliability: weighted_mean(bins, total, |bin| bin.reliability),
            sharpness: weighted_mean(bins, total, |bin| (bin.midpoint() - 0.5).abs() * 2.0),
            brier_score: weighted_mean(bins, total, |bin| {
                (bin.midpoint() - bin.actual_accuracy).powi(2)
            }),
        }
    }
}

fn weighted_mean(bins: &[CalibrationBin], total: u64, f: impl Fn(&CalibrationBin) -> f64) -> f64 {
    bins.iter()
        .map(|bin| f(bin) * bin.sample_count as f64)
        .sum::<f64>()
        / total as f64
}

type BinTable = Arc<Mutex<Vec<CalibrationBin>>>;

/// Online calibration model. Reads and updates for one key are serialised by
/// that key's mutex; distinct keys proceed in parallel.
#[derive(Debug)]
pub struct Calibrator {
    tables: RwLock<HashMap<CalibrationKey, BinTable>>,
    min_bin_samples: u64,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BIN_SAMPLES)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyedBins {
    #[serde(flatten)]
    key: CalibrationKey,
    bins: Vec<CalibrationBin>,
}

impl Calibrator {
    pub fn new(min_bin_samples: u64) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            min_bin_samples,
        }
    }

    pub fn min_bin_samples(&self) -> u64 {
        self.min_bin_samples
    }

    fn table(&self, key: &CalibrationKey) -> Option<BinTable> {
        self.tables.read().get(key).cloned()
    }

    fn table_or_insert(&self, key: &CalibrationKey) -> BinTable {
        if let Some(table) = self.table(key) {
            return table;
        }
        Arc::clone(self.tables.write().entry(key.clone()).or_default())
    }

    pub fn lookup(&self, key: &CalibrationKey, confidence: f64) -> Option<CalibrationBin> {
        let table = self.table(key)?;
        let index = bin_index(confidence);
        let bins = table.lock();
        bins.iter().find(|bin| bin.index() == index).copied()
    }

    /// Adjusts a raw posterior toward the observed accuracy of its bin. A missing
    /// or thin bin only applies the uncertainty discount.
    pub fn calibrate(&self, key: &CalibrationKey, raw: f64, total_uncertainty: f64) -> f64 {
        let calibrated = match self
            .lookup(key, raw)
            .filter(|bin| bin.sample_count >= self.min_bin_samples)
        {
            Some(bin) => {
                raw + 0.3 * (bin.actual_accuracy - raw) - 0.15 * total_uncertainty
            }
            None => {
                debug!(key = %key, raw, "no calibration bin; applying default correction");
                raw - 0.1 * total_uncertainty
            }
        };
        calibrated.clamp(0.1, 0.95)
    }

    pub fn record(&self, key: &CalibrationKey, predicted: f64, actual: f64) -> Result<()> {
        let predicted = ensure_finite("predictedConfidence", predicted)?;
        let actual = ensure_finite("actualAccuracy", actual)?.clamp(0.0, 1.0);
        let index = bin_index(predicted);

        let table = self.table_or_insert(key);
        let mut bins = table.lock();
        let position = match bins.iter().position(|bin| bin.index() == index) {
            Some(position) => position,
            None => {
                let position = bins.partition_point(|bin| bin.index() < index);
                bins.insert(position, CalibrationBin::empty(index));
                position
            }
        };
        bins[position].observe(actual);
        Ok(())
    }

    pub fn metrics(&self, key: &CalibrationKey) -> CalibrationMetrics {
        match self.table(key) {
            Some(table) => CalibrationMetrics::from_bins(&table.lock()),
            None => CalibrationMetrics::default(),
        }
    }

    pub fn bins(&self, key: &CalibrationKey) -> Vec<CalibrationBin> {
        self.table(key)
            .map(|table| table.lock().clone())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<CalibrationKey> {
        let mut keys: Vec<_> = self.tables.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot: Vec<KeyedBins> = self
            .keys()
            .into_iter()
            .map(|key| KeyedBins {
                bins: self.bins(&key),
                key,
            })
            .collect();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), keys = snapshot.len(), "calibration state saved");
        Ok(())
    }

    pub fn load(path: &Path, min_bin_samples: u64) -> anyhow::Result<Self> {
        let calibrator = Self::new(min_bin_samples);
        if !path.exists() {
            return Ok(calibrator);
        }
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let snapshot: Vec<KeyedBins> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse calibration state {}", path.display()))?;
        {
            let mut tables = calibrator.tables.write();
            for KeyedBins { key, mut bins } in snapshot {
                bins.sort_by_key(CalibrationBin::index);
                bins.dedup_by_key(|bin| bin.index());
                tables.insert(key, Arc::new(Mutex::new(bins)));
            }
        }
        info!(path = %path.display(), keys = calibrator.keys().len(), "calibration state loaded");
        Ok(calibrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CalibrationKey {
        CalibrationKey::new("Finance", "Invoice")
    }

    #[test]
    fn bins_cover_the_unit_interval() {
        assert_eq!(bin_index(0.0), 0);
        assert_eq!(bin_index(0.83), 8);
        assert_eq!(bin_index(0.8), 8);
        assert_eq!(bin_index(1.0), 9);
        assert_eq!(bin_index(-0.2), 0);
    }

    #[test]
    fn record_keeps_running_mean_and_reliability() {
        let calibrator = Calibrator::default();
        calibrator.record(&key(), 0.82, 1.0).unwrap();
        calibrator.record(&key(), 0.88, 0.0).unwrap();
        calibrator.record(&key(), 0.85, 1.0).unwrap();
        let bins = calibrator.bins(&CalibrationKey::new("finance", "invoice"));
        assert_eq!(bins.len(), 1);
        let bin = bins[0];
        assert_eq!(bin.sample_count, 3);
        assert!((bin.actual_accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert!((bin.reliability - (2.0_f64 / 3.0 - 0.85).abs()).abs() < 1e-12);
    }

    #[test]
    fn thin_bins_only_apply_uncertainty_discount() {
        let calibrator = Calibrator::default();
        for _ in 0..9 {
            calibrator.record(&key(), 0.83, 0.2).unwrap();
        }
        let calibrated = calibrator.calibrate(&key(), 0.83, 0.4);
        assert!((calibrated - (0.83 - 0.04)).abs() < 1e-12);
    }

    #[test]
    fn calibrated_value_is_clamped() {
        let calibrator = Calibrator::default();
        assert_eq!(calibrator.calibrate(&key(), 0.98, 0.0), 0.95);
        assert_eq!(calibrator.calibrate(&key(), 0.1, 0.6), 0.1);
    }

    #[test]
    fn metrics_default_without_bins() {
        let calibrator = Calibrator::default();
        assert_eq!(calibrator.metrics(&key()), CalibrationMetrics::default());
    }

    #[test]
    fn metrics_are_sample_weighted() {
        let calibrator = Calibrator::default();
        for _ in 0..3 {
            calibrator.record(&key(), 0.95, 1.0).unwrap();
        }
        calibrator.record(&key(), 0.55, 0.55).unwrap();
        let metrics = calibrator.metrics(&key());
        // top bin: midpoint .95, accuracy 1.0; middle bin: midpoint .55, accuracy .55
        assert!((metrics.reliability - (3.0 * 0.05 + 0.0) / 4.0).abs() < 1e-9);
        assert!((metrics.sharpness - (3.0 * 0.9 + 0.1) / 4.0).abs() < 1e-9);
        assert!((metrics.brier_score - (3.0 * 0.0025) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_feedback_is_rejected() {
        let calibrator = Calibrator::default();
        assert!(calibrator.record(&key(), f64::NAN, 1.0).is_err());
        assert!(calibrator.bins(&key()).is_empty());
    }

    #[test]
    fn save_and_load_preserve_bins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("calibration.json");
        let calibrator = Calibrator::default();
        calibrator.record(&key(), 0.42, 1.0).unwrap();
        calibrator.record(&CalibrationKey::new("legal", "contract"), 0.91, 0.0).unwrap();
        calibrator.save(&path).unwrap();

        let restored = Calibrator::load(&path, 10).unwrap();
        assert_eq!(restored.keys(), calibrator.keys());
        assert_eq!(restored.bins(&key()), calibrator.bins(&key()));
    }

    #[test]
    fn loading_a_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let restored = Calibrator::load(&dir.path().join("absent.json"), 10).unwrap();
        assert!(restored.keys().is_empty());
    }
}
