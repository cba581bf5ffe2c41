//! Cooperative cancellation for guarded runs.
//!
//! A [`CancellationToken`] is the external signal a caller uses to stop
//! monitoring a run. Cancelling never aborts work that is already running.

mod token;

pub use token::CancellationToken;
