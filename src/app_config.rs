use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::RunOptions;
use crate::history::FileBackend;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Pipeline backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Polling behavior
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// History persistence settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Defaults applied to submissions
    #[serde(default)]
    pub defaults: DubbingDefaults,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Settings for reaching the pipeline backend
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend, without the /api suffix
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds; uploads can be large
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Settings for the polling schedule
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Seconds between status poll rounds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Consecutive fetch failures after which the poller gives up
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl TrackerConfig {
    /// The poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Settings for history persistence
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HistoryConfig {
    /// History file location; the platform data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl HistoryConfig {
    /// Get the history path to use, falling back to the platform default
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => FileBackend::default_history_path(),
        }
    }
}

/// Defaults applied to submissions that do not override them
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DubbingDefaults {
    /// Source language code, or "auto" for detection
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Languages to dub into
    #[serde(default = "default_target_languages")]
    pub target_languages: Vec<String>,

    /// Pipeline knobs forwarded with every submission
    #[serde(default)]
    pub options: RunOptions,
}

impl Default for DubbingDefaults {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_languages: default_target_languages(),
            options: RunOptions::default(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_endpoint() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_languages() -> Vec<String> {
    vec!["en".to_string()]
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config file as JSON")?;
        Ok(config)
    }

    /// Write this configuration as pretty-printed JSON
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.backend.endpoint).map_err(|e| {
            anyhow!(
                "Invalid backend endpoint '{}': {}",
                self.backend.endpoint,
                e
            )
        })?;

        if self.tracker.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be at least 1"));
        }
        if self.tracker.failure_threshold == 0 {
            return Err(anyhow!("failure_threshold must be at least 1"));
        }

        // Validate languages
        if !self.defaults.source_language.eq_ignore_ascii_case("auto") {
            let _source_name =
                crate::language_utils::get_language_name(&self.defaults.source_language)?;
        }
        for code in &self.defaults.target_languages {
            let _target_name = crate::language_utils::get_language_name(code)?;
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig::default(),
            tracker: TrackerConfig::default(),
            history: HistoryConfig::default(),
            defaults: DubbingDefaults::default(),
            log_level: LogLevel::default(),
        }
    }
}
