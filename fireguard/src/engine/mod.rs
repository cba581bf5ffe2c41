//! Guarded execution engine.
//!
//! A run moves through these steps:
//!
//! 1. The effective configuration is resolved once.
//! 2. Each attempt starts the work on its own task and races it against
//!    cancellation and the timeout.
//! 3. Failures are normalized, reported and, if attempts remain, retried
//!    after a backoff delay.
//!
//! Timed-out and cancelled attempts are detached, not aborted.

mod integration_tests;
mod outcome;
mod overrides;
mod runner;

pub use outcome::{AttemptOutcome, AttemptRecord, RunHandle, RunOutcome, RunReport};
pub use overrides::{ErrorCallback, RunOverrides};
pub use runner::EffectiveConfig;

pub(crate) use runner::{Runner, Sinks};
