//! # Fireguard
//!
//! Guarded fire-and-forget execution for tokio applications.
//!
//! Fireguard runs background work without making the caller wait, and
//! still gives that work:
//!
//! - **Timeouts**: per attempt, with the abandoned attempt detached and observed
//! - **Retries**: for restartable work, with none/linear/exponential backoff
//! - **Policies**: per-task overrides matched by name, pattern or predicate
//! - **Hooks**: async callbacks on start, retry, error and completion
//! - **Observability**: `tracing` logs, `metrics` counters and structured events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fireguard::prelude::*;
//!
//! let guard = Guard::new();
//! guard.configure_policies(|p| {
//!     p.for_task("EmailSender", |policy| policy.with_retry(3).with_backoff(BackoffStrategy::Exponential));
//! })?;
//!
//! let handle = guard.run(
//!     Operation::from_factory(move || send_email(message.clone())).named("EmailSender"),
//!     RunOverrides::new(),
//! );
//!
//! // Optional: the caller may wait for the report.
//! let report = handle.wait().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backoff;
pub mod cancellation;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ext;
pub mod global;
pub mod guard;
pub mod hooks;
pub mod logging;
pub mod operation;
pub mod policy;
pub mod telemetry;

pub use engine::{RunHandle, RunOutcome, RunOverrides, RunReport};
pub use errors::{ConfigError, GuardError};
pub use guard::Guard;
pub use operation::Operation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::{delay, BackoffStrategy};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::GuardOptions;
    pub use crate::engine::{
        AttemptOutcome, AttemptRecord, RunHandle, RunOutcome, RunOverrides, RunReport,
    };
    pub use crate::errors::{AggregateError, ConfigError, GuardError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::ext::{FireAndForget, FireAndForgetFactory};
    pub use crate::global::{clear_global, global, set_global};
    pub use crate::guard::{Guard, GuardBuilder};
    pub use crate::hooks::{ErrorNotifierPlugin, HookContext, HookStage, Plugin};
    pub use crate::logging::{GuardLogger, Severity, TracingLogger};
    pub use crate::operation::Operation;
    pub use crate::policy::Policy;
    pub use crate::telemetry::{Baggage, MetricsTelemetry, TelemetrySink};
}
