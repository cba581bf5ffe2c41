//! Structured lifecycle events.
//!
//! Each run emits `task.started` per attempt and exactly one terminal event
//! (`task.completed`, `task.failed` or `task.timeout`). Retried attempts emit
//! `task.failed` with `"will_retry": true`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::GuardError;

/// Emitted when an attempt starts.
pub const TASK_STARTED: &str = "task.started";
/// Emitted when an attempt completes.
pub const TASK_COMPLETED: &str = "task.completed";
/// Emitted when an attempt fails.
pub const TASK_FAILED: &str = "task.failed";
/// Emitted when an attempt times out.
pub const TASK_TIMEOUT: &str = "task.timeout";

/// Payload of a lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    /// Identifier shared by every event of one run.
    pub run_id: Uuid,
    /// Resolved task name.
    pub task_name: String,
    /// 1-based attempt index.
    pub attempt: u32,
    /// Total planned attempts.
    pub total_attempts: u32,
    /// Attempt duration, absent for start events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Error kind, when the attempt did not complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Error message, when the attempt did not complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True if a failed attempt will be retried.
    pub will_retry: bool,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl TaskEvent {
    /// Creates an event for one attempt.
    #[must_use]
    pub fn new(run_id: Uuid, task_name: impl Into<String>, attempt: u32, total_attempts: u32) -> Self {
        Self {
            run_id,
            task_name: task_name.into(),
            attempt,
            total_attempts,
            duration_ms: None,
            error_kind: None,
            error: None,
            will_retry: false,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Sets the attempt duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_secs_f64() * 1000.0);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: &GuardError) -> Self {
        self.error_kind = Some(error.kind());
        self.error = Some(error.to_string());
        self
    }

    /// Marks the failure as retried.
    #[must_use]
    pub fn will_retry(mut self, will_retry: bool) -> Self {
        self.will_retry = will_retry;
        self
    }

    /// Converts to the JSON payload handed to an [`EventSink`].
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
