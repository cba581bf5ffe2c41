//! Counters, duration histogram and attempt spans.
//!
//! Telemetry is observational only. The engine calls the configured
//! [`TelemetrySink`] at each lifecycle point before any hook runs.

mod baggage;
mod sink;

pub use baggage::Baggage;
pub use sink::{
    attempt_span, AttemptTags, CollectingTelemetry, MetricsTelemetry, NoOpTelemetry, SpanContext,
    TelemetryEvent, TelemetrySink, DURATION_METRIC,
};

#[cfg(test)]
pub use sink::MockTelemetrySink;
