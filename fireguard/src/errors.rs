//! Error types for the fireguard crate.
//!
//! Guarded work fails with arbitrary [`anyhow::Error`] values. The engine
//! normalizes them and wraps them in [`GuardError`] before handing them to
//! callbacks, hooks, logs and the final [`crate::RunReport`].

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for guarded execution.
#[derive(Debug, Error)]
pub enum GuardError {
    /// An attempt was still outstanding when its deadline passed.
    #[error("task '{task_name}' timed out after {} ms", timeout.as_millis())]
    Timeout {
        /// The resolved task name.
        task_name: String,
        /// The effective timeout that elapsed.
        timeout: Duration,
    },

    /// An attempt raised an error.
    #[error("task '{task_name}' failed: {source}")]
    Failed {
        /// The resolved task name.
        task_name: String,
        /// The normalized underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// A non-retryable operation was consumed more than once.
    #[error("operation '{task_name}' was already consumed and cannot be started again")]
    AlreadyConsumed {
        /// The resolved task name.
        task_name: String,
    },

    /// Invalid configuration.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The run task itself was aborted, typically by a panicking hook.
    #[error("guarded run for '{task_name}' aborted: {reason}")]
    RunAborted {
        /// The resolved task name.
        task_name: String,
        /// Why the run task stopped.
        reason: String,
    },
}

impl GuardError {
    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(task_name: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            task_name: task_name.into(),
            timeout,
        }
    }

    /// Creates a failure error around an already-normalized cause.
    #[must_use]
    pub fn failed(task_name: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Failed {
            task_name: task_name.into(),
            source,
        }
    }

    /// Returns true for timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the underlying cause for failures.
    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Short type label used in structured events and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Failed { .. } => "failed",
            Self::AlreadyConsumed { .. } => "already_consumed",
            Self::Config(_) => "config",
            Self::RunAborted { .. } => "run_aborted",
        }
    }
}

/// Errors raised synchronously when configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Retry count was negative.
    #[error("retry count cannot be negative (got {0})")]
    NegativeRetry(i64),

    /// Timeout was negative.
    #[error("timeout must be non-negative (got {0} ms)")]
    NegativeTimeout(i64),

    /// Retry base delay was zero or negative.
    #[error("retry base delay must be positive (got {0} ms)")]
    NonPositiveBaseDelay(i64),

    /// A policy was registered for an empty task name.
    #[error("task name is required for a policy rule")]
    EmptyTaskName,

    /// A policy pattern did not compile.
    #[error("invalid policy pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compiler's message.
        reason: String,
    },

    /// A setting could not be parsed.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// The setting name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Several independent failures reported together.
///
/// Work that fans out (for example with `futures::future::join_all`) can
/// return this so the engine can unwrap a lone cause before reporting it.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<anyhow::Error>,
}

impl AggregateError {
    /// Creates an aggregate from its causes.
    #[must_use]
    pub fn new(errors: Vec<anyhow::Error>) -> Self {
        Self { errors }
    }

    /// Returns the inner causes.
    #[must_use]
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    /// Returns the number of inner causes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if there are no inner causes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Replaces nested aggregates with their leaves, depth first.
    #[must_use]
    pub fn flatten(self) -> Self {
        let mut leaves = Vec::with_capacity(self.errors.len());
        for error in self.errors {
            match error.downcast::<AggregateError>() {
                Ok(nested) => leaves.extend(nested.flatten().errors),
                Err(leaf) => leaves.push(leaf),
            }
        }
        Self { errors: leaves }
    }

    /// Consumes the aggregate and returns its causes.
    #[must_use]
    pub fn into_errors(self) -> Vec<anyhow::Error> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.errors.len())?;
        for (index, error) in self.errors.iter().enumerate() {
            write!(f, "; [{index}] {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Flattens aggregates and unwraps a single-cause aggregate into its cause.
///
/// Aggregates with several causes stay aggregates.
#[must_use]
pub fn normalize_error(error: anyhow::Error) -> anyhow::Error {
    match error.downcast::<AggregateError>() {
        Ok(aggregate) => {
            let mut flattened = aggregate.flatten();
            if flattened.len() == 1 {
                flattened.errors.remove(0)
            } else {
                anyhow::Error::new(flattened)
            }
        }
        Err(error) => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = GuardError::timeout("HeavyJob", Duration::from_millis(50));
        assert_eq!(err.to_string(), "task 'HeavyJob' timed out after 50 ms");
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_failed_exposes_cause() {
        let err = GuardError::failed("DataSync", anyhow::anyhow!("boom"));
        assert_eq!(err.cause().map(ToString::to_string), Some("boom".to_string()));
        assert!(err.to_string().contains("DataSync"));
    }

    #[test]
    fn test_normalize_single_cause_aggregate() {
        let aggregate = AggregateError::new(vec![anyhow::anyhow!("inner")]);
        let normalized = normalize_error(anyhow::Error::new(aggregate));

        assert!(normalized.downcast_ref::<AggregateError>().is_none());
        assert_eq!(normalized.to_string(), "inner");
    }

    #[test]
    fn test_normalize_nested_single_cause() {
        let inner = AggregateError::new(vec![anyhow::anyhow!("deep")]);
        let outer = AggregateError::new(vec![anyhow::Error::new(inner)]);
        let normalized = normalize_error(anyhow::Error::new(outer));

        assert_eq!(normalized.to_string(), "deep");
    }

    #[test]
    fn test_normalize_keeps_multi_cause_aggregate() {
        let nested = AggregateError::new(vec![anyhow::anyhow!("b"), anyhow::anyhow!("c")]);
        let aggregate = AggregateError::new(vec![anyhow::anyhow!("a"), anyhow::Error::new(nested)]);
        let normalized = normalize_error(anyhow::Error::new(aggregate));

        let aggregate = normalized
            .downcast_ref::<AggregateError>()
            .expect("still an aggregate");
        assert_eq!(aggregate.len(), 3);
    }

    #[test]
    fn test_normalize_plain_error_untouched() {
        let normalized = normalize_error(anyhow::anyhow!("plain"));
        assert_eq!(normalized.to_string(), "plain");
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::NegativeRetry(-1).to_string(),
            "retry count cannot be negative (got -1)"
        );
        let err: GuardError = ConfigError::EmptyTaskName.into();
        assert_eq!(err.kind(), "config");
    }
}
