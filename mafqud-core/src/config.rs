use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Policy for a candidate pair where no face score could be determined
/// (face recognition disabled, no photos, or every comparison failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFacePolicy {
    /// Fall back to metadata-only weights; the pair is not penalized for
    /// absent biometric evidence.
    MetadataOnly,
    /// Blend a face score of 0 at the normal face weight.
    ZeroFace,
}

/// Admin-configurable matching settings. Fetched once per matching run and
/// passed through every call; edits take effect on the next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Minimum score for a match to be persisted and surfaced to users
    #[serde(default = "default_display_threshold")]
    pub display_threshold: u8,
    /// Minimum score for proactively alerting the older report's owner
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: u8,
    #[serde(default)]
    pub use_face_recognition: bool,
    #[serde(default = "default_max_matches")]
    pub max_matches_per_report: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates_scanned: usize,
    #[serde(default = "default_face_timeout")]
    pub face_api_timeout_seconds: u64,
    #[serde(default = "default_missing_face_policy")]
    pub missing_face_policy: MissingFacePolicy,
    /// Worker pool size for per-candidate scoring within one run
    #[serde(default = "default_scoring_workers")]
    pub scoring_workers: usize,
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval_seconds: u64,
}

fn default_display_threshold() -> u8 {
    40
}

fn default_notify_threshold() -> u8 {
    60
}

fn default_max_matches() -> usize {
    20
}

fn default_max_candidates() -> usize {
    1000
}

fn default_face_timeout() -> u64 {
    5
}

fn default_missing_face_policy() -> MissingFacePolicy {
    MissingFacePolicy::MetadataOnly
}

fn default_scoring_workers() -> usize {
    4
}

fn default_rescan_interval() -> u64 {
    3600
}

impl MatchSettings {
    /// Load settings with fallback chain:
    /// 1. /etc/mafqud/mafqud.toml (system-wide)
    /// 2. ~/.config/mafqud/mafqud.toml (user)
    /// 3. Compiled defaults
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(settings) = Self::load_from_path("/etc/mafqud/mafqud.toml") {
            settings.validate()?;
            return Ok(settings);
        }

        if let Some(home) = std::env::var_os("HOME") {
            let user_config = PathBuf::from(home)
                .join(".config")
                .join("mafqud")
                .join("mafqud.toml");
            if let Ok(settings) = Self::load_from_path(&user_config) {
                settings.validate()?;
                return Ok(settings);
            }
        }

        let settings = Self::default();
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific file path
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let settings: MatchSettings = toml::from_str(&contents)?;
        Ok(settings)
    }

    /// Validate settings values. The engine refuses to run with invalid
    /// settings rather than silently clamping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_threshold > 100 {
            return Err(ConfigError::Validation(
                "Display threshold must be between 0 and 100".to_string(),
            ));
        }

        if self.notify_threshold > 100 {
            return Err(ConfigError::Validation(
                "Notify threshold must be between 0 and 100".to_string(),
            ));
        }

        if self.notify_threshold < self.display_threshold {
            return Err(ConfigError::Validation(
                "Notify threshold must not be below display threshold".to_string(),
            ));
        }

        if self.max_matches_per_report == 0 {
            return Err(ConfigError::Validation(
                "Max matches per report must be greater than 0".to_string(),
            ));
        }

        if self.max_candidates_scanned == 0 {
            return Err(ConfigError::Validation(
                "Max candidates scanned must be greater than 0".to_string(),
            ));
        }

        if self.face_api_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Face API timeout must be greater than 0".to_string(),
            ));
        }

        if self.scoring_workers == 0 {
            return Err(ConfigError::Validation(
                "Scoring workers must be greater than 0".to_string(),
            ));
        }

        if self.rescan_interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "Rescan interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn face_api_timeout(&self) -> Duration {
        Duration::from_secs(self.face_api_timeout_seconds)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_seconds)
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            display_threshold: 40,
            notify_threshold: 60,
            use_face_recognition: false,
            max_matches_per_report: 20,
            max_candidates_scanned: 1000,
            face_api_timeout_seconds: 5,
            missing_face_policy: MissingFacePolicy::MetadataOnly,
            scoring_workers: 4,
            rescan_interval_seconds: 3600,
        }
    }
}
