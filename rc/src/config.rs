//! Coordinator configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Deadline for test-info requests in milliseconds
    #[serde(rename = "test-info-timeout-ms", default = "default_test_info_timeout_ms")]
    pub test_info_timeout_ms: u64,

    /// Channel buffer size for the coordinator mailbox
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Max payload size in bytes (1MB default)
    #[serde(rename = "max-payload-size", default = "default_max_payload_size")]
    pub max_payload_size: usize,
}

fn default_test_info_timeout_ms() -> u64 {
    debug!("default_test_info_timeout_ms: called");
    2500
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

fn default_max_payload_size() -> usize {
    debug!("default_max_payload_size: called");
    1024 * 1024 // 1MB
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            test_info_timeout_ms: 2500,
            channel_buffer: 1000,
            max_payload_size: 1024 * 1024,
        }
    }
}

impl CoordinatorConfig {
    /// Get the test-info deadline as a Duration
    pub fn test_info_timeout(&self) -> Duration {
        debug!(test_info_timeout_ms = %self.test_info_timeout_ms, "CoordinatorConfig::test_info_timeout: called");
        Duration::from_millis(self.test_info_timeout_ms)
    }

    /// Reject values the Coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channel_buffer == 0 {
            return Err(eyre::eyre!("channel-buffer must be at least 1"));
        }
        if self.test_info_timeout_ms == 0 {
            return Err(eyre::eyre!("test-info-timeout-ms must be positive"));
        }
        Ok(())
    }

    /// Load configuration: explicit path, then `./.reqcoord.yml`, then the
    /// user config dir, then defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let candidates = search_paths(Path::new("."), dirs::config_dir());
        Self::load_with_candidates(config_path, &candidates)
    }

    /// Load from an explicit path, or the first candidate that parses
    ///
    /// An explicit path must load. Broken candidates are logged and skipped.
    pub fn load_with_candidates(config_path: Option<&PathBuf>, candidates: &[PathBuf]) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!(path = %candidate.display(), error = %e, "Skipping unusable config"),
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        info!(path = %path.as_ref().display(), "Loaded config");
        Ok(config)
    }
}

/// Config file locations in lookup order
pub fn search_paths(project_dir: &Path, user_config_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = vec![project_dir.join(".reqcoord.yml")];
    if let Some(dir) = user_config_dir {
        paths.push(dir.join("reqcoord").join("reqcoord.yml"));
    }
    paths
}
