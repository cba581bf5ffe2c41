//! Per-call overrides.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::BackoffStrategy;
use crate::cancellation::CancellationToken;
use crate::errors::GuardError;

/// Callback invoked with every error a run observes, including retried ones.
pub type ErrorCallback = Arc<dyn Fn(&GuardError) + Send + Sync>;

/// Arguments supplied with one guarded call. Set fields take precedence
/// over policies and process-wide defaults.
#[derive(Clone, Default)]
pub struct RunOverrides {
    /// Explicit display name.
    pub task_name: Option<String>,
    /// Per-attempt timeout; zero disables the timeout.
    pub timeout: Option<Duration>,
    /// Number of retries after the first attempt.
    pub retry_count: Option<u32>,
    /// Delay growth between retries.
    pub backoff: Option<BackoffStrategy>,
    /// Error callback.
    pub on_error: Option<ErrorCallback>,
    /// Token that stops the run.
    pub cancellation: Option<Arc<CancellationToken>>,
}

impl RunOverrides {
    /// Creates empty overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_retry(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn with_on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&GuardError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl fmt::Debug for RunOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOverrides")
            .field("task_name", &self.task_name)
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .field("backoff", &self.backoff)
            .field("on_error", &self.on_error.is_some())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}
