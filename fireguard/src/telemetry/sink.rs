//! Telemetry sink trait and implementations.

use metrics::{counter, histogram};
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;

use super::Baggage;

/// Name of the attempt duration histogram, recorded in milliseconds.
pub const DURATION_METRIC: &str = "fireguard.operations.duration";

/// Lifecycle points counted by the telemetry sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryEvent {
    /// An attempt started.
    Started,
    /// An attempt completed successfully.
    Completed,
    /// The final attempt failed.
    Failed,
    /// A failed attempt will be retried.
    Retried,
    /// An attempt exceeded its timeout.
    TimedOut,
    /// The run stopped because it was cancelled.
    Cancelled,
}

impl TelemetryEvent {
    /// Returns the counter name for this event.
    #[must_use]
    pub fn metric_name(self) -> &'static str {
        match self {
            Self::Started => "fireguard.operations.started",
            Self::Completed => "fireguard.operations.completed",
            Self::Failed => "fireguard.operations.failed",
            Self::Retried => "fireguard.operations.retried",
            Self::TimedOut => "fireguard.operations.timeout",
            Self::Cancelled => "fireguard.operations.cancelled",
        }
    }
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}

/// Tags attached to every measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptTags {
    /// Resolved task name.
    pub task_name: String,
    /// 1-based attempt index.
    pub attempt: u32,
}

impl AttemptTags {
    /// Creates tags for one attempt.
    #[must_use]
    pub fn new(task_name: impl Into<String>, attempt: u32) -> Self {
        Self {
            task_name: task_name.into(),
            attempt,
        }
    }
}

/// Caller context captured when a run is started.
#[derive(Debug, Clone)]
pub struct SpanContext {
    /// Span that was current when the run was started.
    pub parent: tracing::Span,
    /// Baggage that was current when the run was started.
    pub baggage: Baggage,
}

impl SpanContext {
    /// Captures the current span and baggage.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            parent: tracing::Span::current(),
            baggage: Baggage::current(),
        }
    }

    /// A context with no parent span and no baggage.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            parent: tracing::Span::none(),
            baggage: Baggage::new(),
        }
    }
}

/// Receives counters, durations and attempt spans from the engine.
///
/// Implementations must be cheap and must not fail; telemetry never changes
/// the outcome of a run.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink: Send + Sync {
    /// Counts one lifecycle event.
    fn record(&self, event: TelemetryEvent, tags: &AttemptTags);

    /// Records the duration of a finished attempt.
    fn record_duration(&self, duration: Duration, tags: &AttemptTags);

    /// Opens the span that covers one attempt.
    fn attempt_span(&self, tags: &AttemptTags, context: &SpanContext) -> tracing::Span {
        attempt_span(tags, context)
    }
}

/// Builds an attempt span parented to the captured caller span, with the
/// captured baggage rendered as a field.
#[must_use]
pub fn attempt_span(tags: &AttemptTags, context: &SpanContext) -> tracing::Span {
    let baggage = context
        .baggage
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    tracing::info_span!(
        parent: &context.parent,
        "fireguard.attempt",
        task_name = %tags.task_name,
        attempt = tags.attempt,
        baggage = %baggage,
    )
}

/// Publishes counters and the duration histogram through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTelemetry;

impl TelemetrySink for MetricsTelemetry {
    fn record(&self, event: TelemetryEvent, tags: &AttemptTags) {
        counter!(
            event.metric_name(),
            "task_name" => tags.task_name.clone(),
            "attempt" => tags.attempt.to_string()
        )
        .increment(1);
    }

    fn record_duration(&self, duration: Duration, tags: &AttemptTags) {
        histogram!(
            DURATION_METRIC,
            "task_name" => tags.task_name.clone(),
            "attempt" => tags.attempt.to_string()
        )
        .record(duration.as_secs_f64() * 1000.0);
    }
}

/// A telemetry sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTelemetry;

impl TelemetrySink for NoOpTelemetry {
    fn record(&self, _event: TelemetryEvent, _tags: &AttemptTags) {}

    fn record_duration(&self, _duration: Duration, _tags: &AttemptTags) {}

    fn attempt_span(&self, _tags: &AttemptTags, _context: &SpanContext) -> tracing::Span {
        tracing::Span::none()
    }
}

/// A collecting telemetry sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingTelemetry {
    events: RwLock<Vec<(TelemetryEvent, AttemptTags)>>,
    durations: RwLock<Vec<(Duration, AttemptTags)>>,
}

impl CollectingTelemetry {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<(TelemetryEvent, AttemptTags)> {
        self.events.read().clone()
    }

    /// Returns how many times `event` was recorded.
    #[must_use]
    pub fn count(&self, event: TelemetryEvent) -> usize {
        self.events.read().iter().filter(|(e, _)| *e == event).count()
    }

    /// Returns all recorded durations.
    #[must_use]
    pub fn durations(&self) -> Vec<(Duration, AttemptTags)> {
        self.durations.read().clone()
    }

    /// Clears everything recorded so far.
    pub fn clear(&self) {
        self.events.write().clear();
        self.durations.write().clear();
    }
}

impl TelemetrySink for CollectingTelemetry {
    fn record(&self, event: TelemetryEvent, tags: &AttemptTags) {
        self.events.write().push((event, tags.clone()));
    }

    fn record_duration(&self, duration: Duration, tags: &AttemptTags) {
        self.durations.write().push((duration, tags.clone()));
    }
}
