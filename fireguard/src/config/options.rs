//! Process-wide default options and their serialized form.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::errors::ConfigError;
use crate::logging::Severity;

/// Environment variable holding the default timeout in milliseconds.
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "FIREGUARD_DEFAULT_TIMEOUT_MS";
/// Environment variable holding the default retry count.
pub const ENV_DEFAULT_RETRY: &str = "FIREGUARD_DEFAULT_RETRY";
/// Environment variable holding the default backoff strategy.
pub const ENV_DEFAULT_BACKOFF: &str = "FIREGUARD_DEFAULT_BACKOFF";
/// Environment variable holding the success log level.
pub const ENV_SUCCESS_LOG_LEVEL: &str = "FIREGUARD_SUCCESS_LOG_LEVEL";
/// Environment variable toggling structured log payloads.
pub const ENV_STRUCTURED_LOGS: &str = "FIREGUARD_STRUCTURED_LOGS";
/// Environment variable holding the retry base delay in milliseconds.
pub const ENV_RETRY_BASE_DELAY_MS: &str = "FIREGUARD_RETRY_BASE_DELAY_MS";

/// Default options applied when neither the call site nor a policy says
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
    /// Default timeout per attempt. Zero disables the timeout.
    pub default_timeout: Duration,
    /// Default number of re-executions after the first attempt.
    pub default_retry: u32,
    /// Default backoff strategy between retries.
    pub default_backoff: BackoffStrategy,
    /// Severity used when logging successful runs. `Severity::None` silences them.
    pub success_log_level: Severity,
    /// Emit structured JSON payloads instead of human-readable lines.
    pub structured_logs: bool,
    /// Base delay fed to the backoff calculator.
    pub retry_base_delay: Duration,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            default_retry: 0,
            default_backoff: BackoffStrategy::None,
            success_log_level: Severity::Error,
            structured_logs: false,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl GuardOptions {
    /// Creates options with the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the default retry count.
    #[must_use]
    pub fn with_default_retry(mut self, retry: u32) -> Self {
        self.default_retry = retry;
        self
    }

    /// Sets the default backoff strategy.
    #[must_use]
    pub fn with_default_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.default_backoff = backoff;
        self
    }

    /// Sets the success log level.
    #[must_use]
    pub fn with_success_log_level(mut self, level: Severity) -> Self {
        self.success_log_level = level;
        self
    }

    /// Enables or disables structured log payloads.
    #[must_use]
    pub fn with_structured_logs(mut self, enabled: bool) -> Self {
        self.structured_logs = enabled;
        self
    }

    /// Sets the retry base delay.
    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Returns the default timeout, or `None` when disabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (!self.default_timeout.is_zero()).then_some(self.default_timeout)
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_base_delay.is_zero() {
            return Err(ConfigError::NonPositiveBaseDelay(0));
        }
        Ok(())
    }

    /// Parses and validates options from a JSON document.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: GuardSettings = serde_json::from_str(json)
            .map_err(|e| ConfigError::invalid_value("json", e.to_string()))?;
        Self::try_from(settings)
    }

    /// Loads options from `FIREGUARD_*` environment variables.
    ///
    /// Unset variables keep their default values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads options through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = GuardSettings::default();

        if let Some(raw) = lookup(ENV_DEFAULT_TIMEOUT_MS) {
            settings.default_timeout_ms = parse_number(ENV_DEFAULT_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_RETRY) {
            settings.default_retry = parse_number(ENV_DEFAULT_RETRY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_BACKOFF) {
            settings.default_backoff = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_SUCCESS_LOG_LEVEL) {
            settings.success_log_level = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_STRUCTURED_LOGS) {
            settings.structured_logs = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::invalid_value(
                        ENV_STRUCTURED_LOGS,
                        format!("expected a boolean, got '{other}'"),
                    ))
                }
            };
        }
        if let Some(raw) = lookup(ENV_RETRY_BASE_DELAY_MS) {
            settings.retry_base_delay_ms = parse_number(ENV_RETRY_BASE_DELAY_MS, &raw)?;
        }

        Self::try_from(settings)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::invalid_value(key, e.to_string()))
}

/// Serialized form of [`GuardOptions`] using signed millisecond integers,
/// so out-of-range values are rejected instead of silently clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Default timeout in milliseconds. Zero disables the timeout.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: i64,
    /// Default retry count.
    #[serde(default)]
    pub default_retry: i64,
    /// Default backoff strategy.
    #[serde(default)]
    pub default_backoff: BackoffStrategy,
    /// Severity for successful runs.
    #[serde(default = "default_success_log_level")]
    pub success_log_level: Severity,
    /// Structured log toggle.
    #[serde(default)]
    pub structured_logs: bool,
    /// Retry base delay in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: i64,
}

fn default_timeout_ms() -> i64 {
    30_000
}

fn default_success_log_level() -> Severity {
    Severity::Error
}

fn default_retry_base_delay_ms() -> i64 {
    500
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            default_retry: 0,
            default_backoff: BackoffStrategy::None,
            success_log_level: default_success_log_level(),
            structured_logs: false,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl TryFrom<GuardSettings> for GuardOptions {
    type Error = ConfigError;

    fn try_from(settings: GuardSettings) -> Result<Self, Self::Error> {
        let default_retry = u32::try_from(settings.default_retry).map_err(|_| {
            if settings.default_retry < 0 {
                ConfigError::NegativeRetry(settings.default_retry)
            } else {
                ConfigError::invalid_value("default_retry", "value is too large")
            }
        })?;
        let default_timeout = u64::try_from(settings.default_timeout_ms)
            .map_err(|_| ConfigError::NegativeTimeout(settings.default_timeout_ms))?;
        if settings.retry_base_delay_ms <= 0 {
            return Err(ConfigError::NonPositiveBaseDelay(settings.retry_base_delay_ms));
        }
        let retry_base_delay = u64::try_from(settings.retry_base_delay_ms)
            .map_err(|_| ConfigError::NonPositiveBaseDelay(settings.retry_base_delay_ms))?;

        let options = Self {
            default_timeout: Duration::from_millis(default_timeout),
            default_retry,
            default_backoff: settings.default_backoff,
            success_log_level: settings.success_log_level,
            structured_logs: settings.structured_logs,
            retry_base_delay: Duration::from_millis(retry_base_delay),
        };
        options.validate()?;
        Ok(options)
    }
}

impl From<&GuardOptions> for GuardSettings {
    fn from(options: &GuardOptions) -> Self {
        Self {
            default_timeout_ms: i64::try_from(options.default_timeout.as_millis()).unwrap_or(i64::MAX),
            default_retry: i64::from(options.default_retry),
            default_backoff: options.default_backoff,
            success_log_level: options.success_log_level,
            structured_logs: options.structured_logs,
            retry_base_delay_ms: i64::try_from(options.retry_base_delay.as_millis()).unwrap_or(i64::MAX),
        }
    }
}
