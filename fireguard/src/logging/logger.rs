//! Logger trait and implementations.

use parking_lot::RwLock;
use std::time::Duration;

use super::Severity;
use crate::errors::GuardError;

/// One log-worthy outcome of an attempt.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    /// Severity to log at.
    pub severity: Severity,
    /// Resolved task name.
    pub task_name: &'a str,
    /// 1-based attempt index.
    pub attempt: u32,
    /// Total planned attempts.
    pub total_attempts: u32,
    /// Time spent in the attempt.
    pub duration: Duration,
    /// Outcome label, e.g. `Completed` or `Retry`.
    pub outcome: &'a str,
    /// The error, if the attempt did not complete.
    pub error: Option<&'a GuardError>,
    /// Render as a structured JSON payload instead of text.
    pub structured: bool,
}

impl LogRecord<'_> {
    /// Duration in milliseconds, rounded to two decimals.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.duration.as_secs_f64() * 100_000.0).round() / 100.0
    }

    /// Renders the record as text or as a JSON payload.
    #[must_use]
    pub fn render(&self) -> String {
        if self.structured {
            let payload = serde_json::json!({
                "task_name": self.task_name,
                "outcome": self.outcome,
                "attempt": self.attempt,
                "attempts": self.total_attempts,
                "duration_ms": self.duration_ms(),
                "error_kind": self.error.map(GuardError::kind),
                "error_message": self.error.map(ToString::to_string),
            });
            return format!("fireguard {payload}");
        }

        match self.error {
            None => format!(
                "fireguard task {} completed ({}) in {} ms on attempt {}/{}",
                self.task_name,
                self.outcome,
                self.duration_ms(),
                self.attempt,
                self.total_attempts
            ),
            Some(error) => format!(
                "fireguard task {} {} after {} ms on attempt {}/{}: {}",
                self.task_name,
                self.outcome,
                self.duration_ms(),
                self.attempt,
                self.total_attempts,
                error
            ),
        }
    }
}

/// Receives log records from the engine.
pub trait GuardLogger: Send + Sync {
    /// Logs one record. Records with `Severity::None` are never passed in.
    fn log(&self, record: &LogRecord<'_>);
}

/// A logger that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl GuardLogger for NoOpLogger {
    fn log(&self, _record: &LogRecord<'_>) {}
}

/// A logger that forwards records to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl GuardLogger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let message = record.render();
        let task_name = record.task_name;
        let attempt = record.attempt;
        let total_attempts = record.total_attempts;
        let outcome = record.outcome;
        let duration_ms = record.duration_ms();

        match record.severity {
            Severity::Trace => {
                tracing::trace!(task_name, attempt, total_attempts, outcome, duration_ms, "{}", message);
            }
            Severity::Debug => {
                tracing::debug!(task_name, attempt, total_attempts, outcome, duration_ms, "{}", message);
            }
            Severity::Info => {
                tracing::info!(task_name, attempt, total_attempts, outcome, duration_ms, "{}", message);
            }
            Severity::Warn => {
                tracing::warn!(task_name, attempt, total_attempts, outcome, duration_ms, "{}", message);
            }
            Severity::Error => {
                tracing::error!(task_name, attempt, total_attempts, outcome, duration_ms, "{}", message);
            }
            Severity::None => {}
        }
    }
}

/// An owned copy of a [`LogRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Severity logged at.
    pub severity: Severity,
    /// Resolved task name.
    pub task_name: String,
    /// 1-based attempt index.
    pub attempt: u32,
    /// Total planned attempts.
    pub total_attempts: u32,
    /// Time spent in the attempt.
    pub duration: Duration,
    /// Outcome label.
    pub outcome: String,
    /// Error kind, if any.
    pub error_kind: Option<String>,
    /// The rendered message.
    pub message: String,
}

/// A collecting logger for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    entries: RwLock<Vec<LogEntry>>,
}

impl CollectingLogger {
    /// Creates a new collecting logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected entries.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Returns entries logged at the given severity.
    #[must_use]
    pub fn entries_at(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// Returns the number of collected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears all collected entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl GuardLogger for CollectingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        self.entries.write().push(LogEntry {
            severity: record.severity,
            task_name: record.task_name.to_string(),
            attempt: record.attempt,
            total_attempts: record.total_attempts,
            duration: record.duration,
            outcome: record.outcome.to_string(),
            error_kind: record.error.map(|e| e.kind().to_string()),
            message: record.render(),
        });
    }
}
