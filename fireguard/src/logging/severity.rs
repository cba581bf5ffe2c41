//! Log severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Severity of a log record. `None` disables logging for that record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Finest-grained diagnostics.
    Trace,
    /// Diagnostics, including detached attempt failures.
    Debug,
    /// Informational.
    Info,
    /// Retried failures.
    Warn,
    /// Terminal failures and timeouts.
    Error,
    /// Nothing is logged.
    None,
}

impl Severity {
    /// Returns true if records at this severity are emitted at all.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }

    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "information" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "none" | "off" => Ok(Self::None),
            other => Err(ConfigError::invalid_value(
                "severity",
                format!("unknown level '{other}'"),
            )),
        }
    }
}
