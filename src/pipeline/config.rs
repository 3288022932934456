//! Pipeline configuration.
//!
//! Every path and threshold the pipeline uses is carried here and injected into
//! the components at construction; nothing reads a fixed location. Values come
//! from defaults, an optional YAML file, `SCRIPT_FORGE_*` environment
//! variables and finally CLI flags, each layer overriding the previous one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quality::QualityPolicy;
use crate::runner::SandboxConfig;
use crate::storage::{DatasetStore, Partition, PartitionPaths};
use crate::validation::RuleProfile;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The configuration file could not be parsed.
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the curation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // Storage
    /// Pending task pool.
    pub pending_path: PathBuf,
    /// One file per partition.
    pub partitions: PartitionPaths,
    /// Per-sample score log written by the score pass.
    pub score_log_path: PathBuf,
    /// Aggregate summary written by the score pass.
    pub score_summary_path: PathBuf,
    /// Human-readable run log; disabled when unset.
    pub log_path: Option<PathBuf>,

    // Retry controller
    /// Maximum generation attempts per sample.
    pub retry_ceiling: u32,
    /// Pause between samples in a batch, in milliseconds.
    pub batch_delay_ms: u64,
    /// Also record each failed attempt in `execution-error` / `rejected`.
    pub record_attempt_failures: bool,
    /// Clean generator output before the gates see it.
    pub sanitize: bool,

    // Sandbox
    pub interpreter: String,
    pub script_suffix: String,
    /// Execution timeout in seconds.
    pub timeout_secs: u64,
    pub scratch_dir: Option<PathBuf>,

    // Gates
    pub rule_profile: RuleProfile,
    pub quality: QualityPolicy,

    // Feedback loop
    /// Partitions scanned for tasks to resubmit.
    pub feedback_sources: Vec<Partition>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data_dir = Path::new("data");
        Self {
            pending_path: data_dir.join("pending.jsonl"),
            partitions: PartitionPaths::under(data_dir),
            score_log_path: data_dir.join("score_log.jsonl"),
            score_summary_path: data_dir.join("score_summary.json"),
            log_path: Some(PathBuf::from("logs/script-forge.log")),

            retry_ceiling: 3,
            batch_delay_ms: 3000,
            record_attempt_failures: true,
            sanitize: true,

            interpreter: "python3".to_string(),
            script_suffix: ".py".to_string(),
            timeout_secs: 10,
            scratch_dir: None,

            rule_profile: RuleProfile::Strict,
            quality: QualityPolicy::default(),

            feedback_sources: vec![Partition::ExecutionError, Partition::PermanentlyFailed],
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a YAML configuration file; missing keys keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SCRIPT_FORGE_DATA_DIR`: Directory holding pending, partition and score files
    /// - `SCRIPT_FORGE_PENDING_PATH`: Pending pool file (default: data/pending.jsonl)
    /// - `SCRIPT_FORGE_RETRY_CEILING`: Attempts per sample (default: 3)
    /// - `SCRIPT_FORGE_TIMEOUT_SECS`: Execution timeout (default: 10)
    /// - `SCRIPT_FORGE_BATCH_DELAY_MS`: Delay between samples (default: 3000)
    /// - `SCRIPT_FORGE_INTERPRETER`: Interpreter command (default: python3)
    /// - `SCRIPT_FORGE_SCRATCH_DIR`: Directory for scratch files
    /// - `SCRIPT_FORGE_SANITIZE`: Clean generator output (default: true)
    /// - `SCRIPT_FORGE_RECORD_ATTEMPTS`: Record failed attempts (default: true)
    /// - `SCRIPT_FORGE_RULE_PROFILE`: `strict` or `automation` (default: strict)
    /// - `SCRIPT_FORGE_LOG_PATH`: Run log file (default: logs/script-forge.log)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `SCRIPT_FORGE_*` variables that are set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("SCRIPT_FORGE_DATA_DIR") {
            *self = std::mem::take(self).with_data_dir(val);
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_PENDING_PATH") {
            self.pending_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_RETRY_CEILING") {
            self.retry_ceiling = parse_env_value(&val, "SCRIPT_FORGE_RETRY_CEILING")?;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_TIMEOUT_SECS") {
            self.timeout_secs = parse_env_value(&val, "SCRIPT_FORGE_TIMEOUT_SECS")?;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_BATCH_DELAY_MS") {
            self.batch_delay_ms = parse_env_value(&val, "SCRIPT_FORGE_BATCH_DELAY_MS")?;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_INTERPRETER") {
            self.interpreter = val;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_SCRATCH_DIR") {
            self.scratch_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_SANITIZE") {
            self.sanitize = parse_env_bool(&val, "SCRIPT_FORGE_SANITIZE")?;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_RECORD_ATTEMPTS") {
            self.record_attempt_failures = parse_env_bool(&val, "SCRIPT_FORGE_RECORD_ATTEMPTS")?;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_RULE_PROFILE") {
            self.rule_profile = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "SCRIPT_FORGE_RULE_PROFILE".to_string(),
                message,
            })?;
        }

        if let Ok(val) = std::env::var("SCRIPT_FORGE_LOG_PATH") {
            self.log_path = Some(PathBuf::from(val));
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_ceiling == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry_ceiling must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.interpreter.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "interpreter cannot be empty".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.quality.min_syntax_valid_percent) {
            return Err(ConfigError::ValidationFailed(
                "quality.min_syntax_valid_percent must be between 0 and 100".to_string(),
            ));
        }

        if self.quality.min_lines > self.quality.max_lines {
            return Err(ConfigError::ValidationFailed(
                "quality.min_lines cannot exceed quality.max_lines".to_string(),
            ));
        }

        if self.feedback_sources.contains(&Partition::Accepted) {
            return Err(ConfigError::ValidationFailed(
                "feedback_sources cannot include the accepted partition".to_string(),
            ));
        }

        if Partition::ALL
            .iter()
            .any(|p| self.partitions.path(*p) == self.pending_path)
        {
            return Err(ConfigError::ValidationFailed(
                "pending_path cannot be a partition file".to_string(),
            ));
        }

        Ok(())
    }

    /// Execution timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay between samples as a `Duration`.
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Sandbox settings derived from this configuration.
    pub fn sandbox_config(&self) -> SandboxConfig {
        let config = SandboxConfig::new(self.interpreter.clone())
            .with_suffix(self.script_suffix.clone())
            .with_timeout(self.timeout());
        match &self.scratch_dir {
            Some(dir) => config.with_scratch_dir(dir.clone()),
            None => config,
        }
    }

    /// Dataset store over the configured paths.
    pub fn store(&self) -> DatasetStore {
        DatasetStore::new(self.pending_path.clone(), self.partitions.clone())
    }

    /// Builder method to place pending, partition and score files under `dir`.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.pending_path = dir.join("pending.jsonl");
        self.partitions = PartitionPaths::under(dir);
        self.score_log_path = dir.join("score_log.jsonl");
        self.score_summary_path = dir.join("score_summary.json");
        self
    }

    /// Builder method to set the pending pool path.
    pub fn with_pending_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pending_path = path.into();
        self
    }

    /// Builder method to set the retry ceiling.
    pub fn with_retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    /// Builder method to set the execution timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Builder method to set the batch delay.
    pub fn with_batch_delay_ms(mut self, millis: u64) -> Self {
        self.batch_delay_ms = millis;
        self
    }

    /// Builder method to set the interpreter.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Builder method to set the semantic rule profile.
    pub fn with_rule_profile(mut self, profile: RuleProfile) -> Self {
        self.rule_profile = profile;
        self
    }

    /// Builder method to set the quality thresholds.
    pub fn with_quality(mut self, quality: QualityPolicy) -> Self {
        self.quality = quality;
        self
    }

    /// Builder method to enable or disable output sanitization.
    pub fn with_sanitize(mut self, enabled: bool) -> Self {
        self.sanitize = enabled;
        self
    }

    /// Builder method to enable or disable per-attempt failure records.
    pub fn with_record_attempt_failures(mut self, enabled: bool) -> Self {
        self.record_attempt_failures = enabled;
        self
    }

    /// Builder method to set the feedback sources.
    pub fn with_feedback_sources(mut self, sources: Vec<Partition>) -> Self {
        self.feedback_sources = sources;
        self
    }

    /// Builder method to set or disable the run log.
    pub fn with_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_path = path;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
