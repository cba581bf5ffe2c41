//! Lifecycle hooks.
//!
//! Hooks are grouped by [`HookStage`] into an immutable [`Pipeline`]. Every
//! run captures one pipeline snapshot when it starts, so reconfiguring the
//! [`HookRegistry`] never affects runs already in flight.
//!
//! Hooks of one stage run sequentially in registration order, and the engine
//! waits for them before continuing. A panicking hook is not caught; it
//! aborts the run.

mod pipeline;
mod plugin;

pub use pipeline::{HookRegistry, Pipeline, PipelineBuilder};
pub use plugin::{ErrorNotifierPlugin, Plugin};

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::GuardError;

/// Point in a run at which hooks are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before each attempt.
    Start,
    /// After a failed attempt that will be retried.
    Retry,
    /// After a terminal failure or timeout.
    Error,
    /// After a successful attempt.
    Complete,
}

impl HookStage {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Retry => "retry",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook sees.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// The stage being invoked.
    pub stage: HookStage,
    /// Resolved task name.
    pub task_name: String,
    /// Identifier of the run.
    pub run_id: Uuid,
    /// 1-based attempt index.
    pub attempt: u32,
    /// Total planned attempts.
    pub total_attempts: u32,
    /// The error for retry and error stages.
    pub error: Option<Arc<GuardError>>,
}

impl HookContext {
    /// Creates a context without an error.
    #[must_use]
    pub fn new(
        stage: HookStage,
        task_name: impl Into<String>,
        run_id: Uuid,
        attempt: u32,
        total_attempts: u32,
    ) -> Self {
        Self {
            stage,
            task_name: task_name.into(),
            run_id,
            attempt,
            total_attempts,
            error: None,
        }
    }

    /// Attaches an error.
    #[must_use]
    pub fn with_error(mut self, error: Arc<GuardError>) -> Self {
        self.error = Some(error);
        self
    }

    /// Returns true if this is the last planned attempt.
    #[must_use]
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.total_attempts
    }
}

/// A lifecycle callback.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Invoked once per matching lifecycle point.
    async fn call(&self, context: &HookContext);
}

/// Adapts an async closure into a [`Hook`].
pub(crate) struct FnHook<F>(pub(crate) F);

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn call(&self, context: &HookContext) {
        (self.0)(context.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_fn_hook_receives_context() {
        let seen = Arc::new(AtomicU32::new(0));
        let captured = seen.clone();
        let hook = FnHook(move |ctx: HookContext| {
            let captured = captured.clone();
            async move {
                captured.store(ctx.attempt, Ordering::SeqCst);
            }
        });

        let context = HookContext::new(HookStage::Start, "Sync", Uuid::new_v4(), 2, 3);
        hook.call(&context).await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(!context.is_final_attempt());
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(HookStage::Complete.to_string(), "complete");
        assert_eq!(HookStage::Retry.as_str(), "retry");
    }
}
