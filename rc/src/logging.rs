//! Tracing subscriber setup
//!
//! Stdout carries frames, so logs always go to a file. The embedding driver
//! picks the directory; [`default_log_dir`] is the fallback.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::info;

/// Default directory for log files
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reqcoord")
        .join("logs")
}

/// Install the global tracing subscriber writing to `<log_dir>/reqcoord.log`
///
/// Returns the log file path. Fails if a global subscriber is already set.
pub fn init(log_dir: &Path, verbose: bool) -> Result<PathBuf> {
    fs::create_dir_all(log_dir).context("Failed to create log directory")?;

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_path = log_dir.join("reqcoord.log");
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    info!(log_path = %log_path.display(), verbose, "Logging initialized");
    Ok(log_path)
}
