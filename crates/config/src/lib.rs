//! Configuration loading, validation, and management for Draftline.
//!
//! Loads configuration from `~/.draftline/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.draftline/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Per-request HTTP timeout for provider clients
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// JSON conformance retry settings
    #[serde(default)]
    pub conformance: ConformanceConfig,

    /// Timeline segmentation and generation settings
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Where jobs and timelines are stored
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("providers", &self.providers)
            .field("conformance", &self.conformance)
            .field("timeline", &self.timeline)
            .field("storage", &self.storage)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// How hard to push a backend for schema-conformant JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceConfig {
    /// Extra attempts after the first non-conformant answer
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Temperature of the first attempt; each retry adds 0.1
    #[serde(default = "default_base_temperature")]
    pub base_temperature: f32,
}

/// Highest sampling temperature any supported backend accepts.
pub const MAX_TEMPERATURE: f32 = 2.0;
/// Temperature added per conformance retry.
pub const TEMPERATURE_STEP: f32 = 0.1;
/// Longest idle gap accepted for slicing (one year).
pub const MAX_SLICE_GAP_HOURS: i64 = 24 * 366;

fn default_retry_attempts() -> u32 {
    3
}
fn default_base_temperature() -> f32 {
    0.1
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            base_temperature: default_base_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// K: points generated from each end of the pending list per iteration
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Idle gap that starts a new slice
    #[serde(default = "default_slice_gap_hours")]
    pub slice_gap_hours: i64,

    #[serde(default)]
    pub major_change: MajorChangeConfig,
}

fn default_batch_size() -> usize {
    5
}
fn default_slice_gap_hours() -> i64 {
    8
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            slice_gap_hours: default_slice_gap_hours(),
            major_change: MajorChangeConfig::default(),
        }
    }
}

/// Thresholds deciding when a text change warrants a fresh keyframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MajorChangeConfig {
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    #[serde(default = "default_percent_threshold")]
    pub percent_threshold: f64,

    #[serde(default = "default_span_threshold")]
    pub span_threshold: usize,
}

fn default_min_words() -> usize {
    100
}
fn default_percent_threshold() -> f64 {
    20.0
}
fn default_span_threshold() -> usize {
    100
}

impl Default for MajorChangeConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            percent_threshold: default_percent_threshold(),
            span_threshold: default_span_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for job and timeline files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.draftline/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DRAFTLINE_API_KEY` (highest priority), then `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`
    /// - `DRAFTLINE_PROVIDER`, `DRAFTLINE_MODEL`, `DRAFTLINE_DATA_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("DRAFTLINE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("DRAFTLINE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("DRAFTLINE_MODEL") {
            config.default_model = model;
        }

        if let Ok(dir) = std::env::var("DRAFTLINE_DATA_DIR") {
            config.storage.data_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".draftline")
    }

    /// Resolved storage root: configured `data_dir` or `~/.draftline/data`.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("data"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeline.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "timeline.batch_size must be at least 1".into(),
            ));
        }

        let conformance = &self.conformance;
        let highest_temperature =
            conformance.base_temperature + conformance.retry_attempts as f32 * TEMPERATURE_STEP;
        if conformance.base_temperature < 0.0 || highest_temperature > MAX_TEMPERATURE + 1e-4 {
            return Err(ConfigError::ValidationError(format!(
                "conformance.base_temperature + retry_attempts * {TEMPERATURE_STEP} must stay \
                 within 0.0 and {MAX_TEMPERATURE} (last retry would use {highest_temperature:.1})"
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        if !(1..=MAX_SLICE_GAP_HOURS).contains(&self.timeline.slice_gap_hours) {
            return Err(ConfigError::ValidationError(format!(
                "timeline.slice_gap_hours must be between 1 and {MAX_SLICE_GAP_HOURS}"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
            providers: HashMap::new(),
            conformance: ConformanceConfig::default(),
            timeline: TimelineConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
