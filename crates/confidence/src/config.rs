use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::calibration::DEFAULT_MIN_BIN_SAMPLES;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    pub min_bin_samples: u64,
    pub state_path: Option<PathBuf>,
    /// Learned per-key accuracy. Defaults to a sibling of `state_path`.
    pub patterns_path: Option<PathBuf>,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            min_bin_samples: DEFAULT_MIN_BIN_SAMPLES,
            state_path: None,
            patterns_path: None,
        }
    }
}

impl CalibrationSettings {
    pub fn patterns_path(&self) -> Option<PathBuf> {
        self.patterns_path
            .clone()
            .or_else(|| self.state_path.as_deref().map(sibling_patterns_path))
    }
}

fn sibling_patterns_path(state_path: &Path) -> PathBuf {
    let stem = state_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "calibration".to_string());
    state_path.with_file_name(format!("{stem}.patterns.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_default_next_to_calibration_state() {
        let settings = CalibrationSettings {
            state_path: Some(PathBuf::from("state/calibration.json")),
            ..Default::default()
        };
        assert_eq!(
            settings.patterns_path(),
            Some(PathBuf::from("state/calibration.patterns.json"))
        );
        let explicit = CalibrationSettings {
            patterns_path: Some(PathBuf::from("p.json")),
            ..settings
        };
        assert_eq!(explicit.patterns_path(), Some(PathBuf::from("p.json")));
        assert_eq!(CalibrationSettings::default().patterns_path(), None);
    }
}
