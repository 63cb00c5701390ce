//! Runtime configuration for the pipeline.
//!
//! Every field has a serde default, so a partial JSON document (or none at
//! all) yields a usable configuration. `LYRICFLOW_*` environment variables
//! override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::invoker::RetryPolicy;

/// Error loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid configuration JSON.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range or unparseable.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The offending key or environment variable.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Pipeline runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name recorded on the final artifact.
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    /// Retry policy for external calls.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Pause between stages in milliseconds.
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
    /// Follow-up prompts allowed per stage after an unusable response.
    #[serde(default = "default_output_recovery_attempts")]
    pub output_recovery_attempts: u32,
    /// Longest accepted request, in characters.
    #[serde(default = "default_max_request_chars")]
    pub max_request_chars: usize,
    /// Optional bound on each external call attempt in milliseconds.
    #[serde(default)]
    pub stage_timeout_ms: Option<u64>,
    /// Per-subscriber buffer of broadcast progress sinks.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_pipeline_name() -> String {
    "song".to_string()
}

fn default_courtesy_delay_ms() -> u64 {
    1500
}

fn default_output_recovery_attempts() -> u32 {
    1
}

fn default_max_request_chars() -> usize {
    2000
}

fn default_broadcast_capacity() -> usize {
    256
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: default_pipeline_name(),
            retry: RetryPolicy::default(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
            output_recovery_attempts: default_output_recovery_attempts(),
            max_request_chars: default_max_request_chars(),
            stage_timeout_ms: None,
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for invalid JSON and
    /// `ConfigError::InvalidValue` for out-of-range values.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`PipelineConfig::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Applies `LYRICFLOW_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad variable.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies `LYRICFLOW_*` overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad variable.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{raw}'")))
        }

        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LYRICFLOW_PIPELINE_NAME") {
            self.pipeline_name = v.trim().to_string();
        }
        if let Some(v) = get("LYRICFLOW_MAX_RETRIES") {
            self.retry.max_retries = parsed("LYRICFLOW_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_INITIAL_DELAY_MS") {
            self.retry.initial_delay_ms = parsed("LYRICFLOW_INITIAL_DELAY_MS", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_BACKOFF_FACTOR") {
            self.retry.backoff_factor = parsed("LYRICFLOW_BACKOFF_FACTOR", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_MAX_DELAY_MS") {
            self.retry.max_delay_ms = parsed("LYRICFLOW_MAX_DELAY_MS", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_COURTESY_DELAY_MS") {
            self.courtesy_delay_ms = parsed("LYRICFLOW_COURTESY_DELAY_MS", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_OUTPUT_RECOVERY_ATTEMPTS") {
            self.output_recovery_attempts = parsed("LYRICFLOW_OUTPUT_RECOVERY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_MAX_REQUEST_CHARS") {
            self.max_request_chars = parsed("LYRICFLOW_MAX_REQUEST_CHARS", &v)?;
        }
        if let Some(v) = get("LYRICFLOW_STAGE_TIMEOUT_MS") {
            self.stage_timeout_ms = Some(parsed("LYRICFLOW_STAGE_TIMEOUT_MS", &v)?);
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline_name.trim().is_empty() {
            return Err(ConfigError::invalid("pipeline_name", "must not be empty"));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::invalid("retry.backoff_factor", "must be at least 1.0"));
        }
        if self.max_request_chars == 0 {
            return Err(ConfigError::invalid("max_request_chars", "must be positive"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::invalid("broadcast_capacity", "must be positive"));
        }
        if self.stage_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("stage_timeout_ms", "must be positive when set"));
        }
        Ok(())
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = name.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the courtesy delay between stages.
    #[must_use]
    pub fn with_courtesy_delay_ms(mut self, delay: u64) -> Self {
        self.courtesy_delay_ms = delay;
        self
    }

    /// Sets how many follow-up prompts a stage may send after an unusable response.
    #[must_use]
    pub fn with_output_recovery_attempts(mut self, attempts: u32) -> Self {
        self.output_recovery_attempts = attempts;
        self
    }

    /// Sets the maximum request length.
    #[must_use]
    pub fn with_max_request_chars(mut self, chars: usize) -> Self {
        self.max_request_chars = chars;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_stage_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.stage_timeout_ms = timeout;
        self
    }

    /// Returns the courtesy delay.
    #[must_use]
    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }
}
