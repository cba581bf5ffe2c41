//! Reusable bundles of hooks.

use std::fmt;
use std::sync::Arc;

use super::{HookContext, HookStage, PipelineBuilder};

/// Registers a set of hooks on a pipeline.
pub trait Plugin: Send + Sync {
    /// Adds this plugin's hooks.
    fn configure(&self, builder: &mut PipelineBuilder);
}

type Notify = Arc<dyn Fn(&HookContext) + Send + Sync>;

/// Calls a synchronous notifier on every error stage, and optionally on
/// every retry.
#[derive(Clone)]
pub struct ErrorNotifierPlugin {
    notify: Notify,
    include_retries: bool,
}

impl ErrorNotifierPlugin {
    /// Creates a plugin around a notifier.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&HookContext) + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
            include_retries: false,
        }
    }

    /// Also notifies on failed attempts that will be retried.
    #[must_use]
    pub fn with_retries(mut self) -> Self {
        self.include_retries = true;
        self
    }
}

impl fmt::Debug for ErrorNotifierPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorNotifierPlugin")
            .field("include_retries", &self.include_retries)
            .finish_non_exhaustive()
    }
}

impl Plugin for ErrorNotifierPlugin {
    fn configure(&self, builder: &mut PipelineBuilder) {
        let stages: &[HookStage] = if self.include_retries {
            &[HookStage::Error, HookStage::Retry]
        } else {
            &[HookStage::Error]
        };

        for &stage in stages {
            let notify = self.notify.clone();
            let hook = move |ctx: HookContext| {
                notify(&ctx);
                futures::future::ready(())
            };
            match stage {
                HookStage::Retry => builder.on_retry(hook),
                _ => builder.on_error(hook),
            };
        }
    }
}
