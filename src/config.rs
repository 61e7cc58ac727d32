//! Environment-level batch configuration.
//!
//! One [`BatchConfig`] per invocation carries the worker count, the rate
//! limit window, polling and local retry settings, and where reference
//! files are uploaded.

use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::RateLimitConfig;
use crate::scheduler::progress::DEFAULT_PROGRESS_INTERVAL_SECS;
use crate::scheduler::{DispatchConfig, RetryPolicy, DEFAULT_CONCURRENCY, DEFAULT_POLL_INTERVAL_SECS};

pub const THROTTLE_LIMIT_VAR: &str = "THROTTLE_LIMIT_FIREFLY";
pub const RATE_PERIOD_VAR: &str = "BATCHFORGE_RATE_PERIOD_SECS";
pub const MIN_CALL_DELAY_VAR: &str = "BATCHFORGE_MIN_CALL_DELAY_MS";
pub const POLL_INTERVAL_VAR: &str = "BATCHFORGE_POLL_INTERVAL_SECS";
pub const RATE_LIMIT_POLLS_VAR: &str = "BATCHFORGE_RATE_LIMIT_POLLS";
pub const THROTTLE_COOLDOWN_VAR: &str = "BATCHFORGE_THROTTLE_COOLDOWN_SECS";
pub const MAX_THROTTLE_RETRIES_VAR: &str = "BATCHFORGE_MAX_THROTTLE_RETRIES";
pub const MAX_RETRIES_VAR: &str = "BATCHFORGE_MAX_RETRIES";
pub const RETRY_BASE_DELAY_VAR: &str = "BATCHFORGE_RETRY_BASE_DELAY_MS";
pub const PROGRESS_INTERVAL_VAR: &str = "BATCHFORGE_PROGRESS_INTERVAL_SECS";
pub const STORAGE_TYPE_VAR: &str = "STORAGE_TYPE";
pub const AZURE_SAS_URL_VAR: &str = "AZURE_STORAGE_SAS_URL";

/// Errors that can occur while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Where local reference files are made available to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StorageConfig {
    /// Send `file://` URLs.
    #[default]
    Local,
    /// Upload into the container behind this SAS URL.
    AzureSas(String),
}

/// Settings for one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Maximum simultaneous work units.
    pub concurrency: usize,
    /// Submission admission window.
    pub rate_limit: RateLimitConfig,
    /// Pause between status polls.
    pub poll_interval: Duration,
    /// Route status polls through the rate limiter as well.
    pub rate_limit_polls: bool,
    /// Local retry of 429 / 5xx / transport errors.
    pub retry: RetryPolicy,
    /// Interval of the progress log; zero disables it.
    pub progress_interval: Duration,
    pub storage: StorageConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit: RateLimitConfig::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            rate_limit_polls: false,
            retry: RetryPolicy::default(),
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
            storage: StorageConfig::Local,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `THROTTLE_LIMIT_FIREFLY`: worker count and calls per window (default: 5)
    /// - `BATCHFORGE_RATE_PERIOD_SECS`: rate window length (default: 60)
    /// - `BATCHFORGE_MIN_CALL_DELAY_MS`: minimum spacing between calls (default: 0)
    /// - `BATCHFORGE_POLL_INTERVAL_SECS`: status poll interval (default: 2)
    /// - `BATCHFORGE_RATE_LIMIT_POLLS`: rate-limit status polls (default: false)
    /// - `BATCHFORGE_THROTTLE_COOLDOWN_SECS`: wait after a 429 (default: 70)
    /// - `BATCHFORGE_MAX_THROTTLE_RETRIES`: 429 retries per call (default: 3)
    /// - `BATCHFORGE_MAX_RETRIES`: 5xx / transport retries per call (default: 3)
    /// - `BATCHFORGE_RETRY_BASE_DELAY_MS`: first back-off delay (default: 1000)
    /// - `BATCHFORGE_PROGRESS_INTERVAL_SECS`: progress log interval, 0 disables (default: 30)
    /// - `STORAGE_TYPE`: `azure` to upload references (default: local)
    /// - `AZURE_STORAGE_SAS_URL`: container SAS URL, required with `STORAGE_TYPE=azure`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BatchConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup(THROTTLE_LIMIT_VAR) {
            let limit: usize = parse_env_value(&val, THROTTLE_LIMIT_VAR)?;
            config.concurrency = limit;
            config.rate_limit.max_calls = limit;
        }

        if let Some(val) = lookup(RATE_PERIOD_VAR) {
            let secs: u64 = parse_env_value(&val, RATE_PERIOD_VAR)?;
            config.rate_limit.period = Duration::from_secs(secs);
        }

        if let Some(val) = lookup(MIN_CALL_DELAY_VAR) {
            let ms: u64 = parse_env_value(&val, MIN_CALL_DELAY_VAR)?;
            config.rate_limit.min_delay = Duration::from_millis(ms);
        }

        if let Some(val) = lookup(POLL_INTERVAL_VAR) {
            let secs: u64 = parse_env_value(&val, POLL_INTERVAL_VAR)?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(val) = lookup(RATE_LIMIT_POLLS_VAR) {
            config.rate_limit_polls = parse_env_bool(&val, RATE_LIMIT_POLLS_VAR)?;
        }

        if let Some(val) = lookup(THROTTLE_COOLDOWN_VAR) {
            let secs: u64 = parse_env_value(&val, THROTTLE_COOLDOWN_VAR)?;
            config.retry.throttle_cooldown = Duration::from_secs(secs);
        }

        if let Some(val) = lookup(MAX_THROTTLE_RETRIES_VAR) {
            config.retry.max_throttle_retries = parse_env_value(&val, MAX_THROTTLE_RETRIES_VAR)?;
        }

        if let Some(val) = lookup(MAX_RETRIES_VAR) {
            config.retry.max_retries = parse_env_value(&val, MAX_RETRIES_VAR)?;
        }

        if let Some(val) = lookup(RETRY_BASE_DELAY_VAR) {
            let ms: u64 = parse_env_value(&val, RETRY_BASE_DELAY_VAR)?;
            config.retry.base_delay = Duration::from_millis(ms);
        }

        if let Some(val) = lookup(PROGRESS_INTERVAL_VAR) {
            let secs: u64 = parse_env_value(&val, PROGRESS_INTERVAL_VAR)?;
            config.progress_interval = Duration::from_secs(secs);
        }

        if let Some(storage) = lookup(STORAGE_TYPE_VAR) {
            config.storage = match storage.trim().to_lowercase().as_str() {
                "" | "local" => StorageConfig::Local,
                "azure" => StorageConfig::AzureSas(
                    lookup(AZURE_SAS_URL_VAR)
                        .filter(|url| !url.trim().is_empty())
                        .ok_or_else(|| ConfigError::MissingEnvVar(AZURE_SAS_URL_VAR.to_string()))?,
                ),
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: STORAGE_TYPE_VAR.to_string(),
                        message: format!("expected 'local' or 'azure', got '{}'", other),
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.max_calls == 0 {
            return Err(ConfigError::ValidationFailed(
                "rate limit max_calls must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.period.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "rate limit period must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_rate_limit_polls(mut self, enabled: bool) -> Self {
        self.rate_limit_polls = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Dispatcher settings derived from this configuration.
    pub fn dispatch_config(&self) -> DispatchConfig {
        let progress = (!self.progress_interval.is_zero()).then_some(self.progress_interval);
        DispatchConfig::new(self.concurrency).with_progress_interval(progress)
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
