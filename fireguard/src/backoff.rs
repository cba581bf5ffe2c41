//! Backoff delays between retry attempts.
//!
//! The calculation is pure so that other schedulers (a persistent job queue,
//! for instance) can reuse the exact same semantics as the engine.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

/// Base delay used when a non-positive base delay is supplied.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base (constant)
    #[default]
    None,
    /// delay = base * attempt
    Linear,
    /// delay = base * 2^(attempt - 1)
    Exponential,
}

impl BackoffStrategy {
    /// Calculates the delay after the given 1-based attempt.
    #[must_use]
    pub fn delay(self, attempt: u32, base: Duration) -> Duration {
        delay(self, attempt, base)
    }
}

impl FromStr for BackoffStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "constant" => Ok(Self::None),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(ConfigError::invalid_value(
                "backoff",
                format!("unknown strategy '{other}'"),
            )),
        }
    }
}

/// Computes the delay to wait after the given 1-based attempt failed.
///
/// A zero base delay falls back to [`DEFAULT_BASE_DELAY`]. Attempt 0 is
/// treated as attempt 1. Results saturate at [`Duration::MAX`].
#[must_use]
pub fn delay(strategy: BackoffStrategy, attempt: u32, base: Duration) -> Duration {
    let base = if base.is_zero() { DEFAULT_BASE_DELAY } else { base };
    let attempt = attempt.max(1);

    match strategy {
        BackoffStrategy::None => base,
        BackoffStrategy::Linear => base.checked_mul(attempt).unwrap_or(Duration::MAX),
        BackoffStrategy::Exponential => 2u32
            .checked_pow(attempt - 1)
            .and_then(|factor| base.checked_mul(factor))
            .unwrap_or(Duration::MAX),
    }
}
