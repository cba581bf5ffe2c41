//! Hook pipeline snapshot, builder and registry.

use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::{FnHook, Hook, HookContext, HookStage, Plugin};

/// Immutable, ordered hook lists for every stage.
#[derive(Clone, Default)]
pub struct Pipeline {
    start: Vec<Arc<dyn Hook>>,
    retry: Vec<Arc<dyn Hook>>,
    error: Vec<Arc<dyn Hook>>,
    complete: Vec<Arc<dyn Hook>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the hooks registered for a stage, in order.
    #[must_use]
    pub fn hooks(&self, stage: HookStage) -> &[Arc<dyn Hook>] {
        match stage {
            HookStage::Start => &self.start,
            HookStage::Retry => &self.retry,
            HookStage::Error => &self.error,
            HookStage::Complete => &self.complete,
        }
    }

    /// Returns the total number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.start.len() + self.retry.len() + self.error.len() + self.complete.len()
    }

    /// Returns true if no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every hook of `context.stage` sequentially.
    pub async fn invoke(&self, context: &HookContext) {
        for hook in self.hooks(context.stage) {
            hook.call(context).await;
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("start", &self.start.len())
            .field("retry", &self.retry.len())
            .field("error", &self.error.len())
            .field("complete", &self.complete.len())
            .finish()
    }
}

/// Collects hooks into a [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing pipeline, keeping its hooks.
    #[must_use]
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            pipeline: pipeline.clone(),
        }
    }

    /// Adds a hook object to a stage.
    pub fn add_hook(&mut self, stage: HookStage, hook: Arc<dyn Hook>) -> &mut Self {
        let hooks = match stage {
            HookStage::Start => &mut self.pipeline.start,
            HookStage::Retry => &mut self.pipeline.retry,
            HookStage::Error => &mut self.pipeline.error,
            HookStage::Complete => &mut self.pipeline.complete,
        };
        hooks.push(hook);
        self
    }

    fn add_fn<F, Fut>(&mut self, stage: HookStage, hook: F) -> &mut Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_hook(stage, Arc::new(FnHook(hook)))
    }

    /// Adds a hook invoked before every attempt.
    pub fn on_start<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_fn(HookStage::Start, hook)
    }

    /// Adds a hook invoked after each failed attempt that will be retried.
    pub fn on_retry<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_fn(HookStage::Retry, hook)
    }

    /// Adds a hook invoked after a terminal failure or a timeout.
    pub fn on_error<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_fn(HookStage::Error, hook)
    }

    /// Adds a hook invoked after a successful attempt.
    pub fn on_complete<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_fn(HookStage::Complete, hook)
    }

    /// Lets a plugin register its hooks.
    pub fn add_plugin(&mut self, plugin: &dyn Plugin) -> &mut Self {
        plugin.configure(self);
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// Shared, atomically replaced hook pipeline.
#[derive(Debug, Default)]
pub struct HookRegistry {
    current: RwLock<Arc<Pipeline>>,
}

impl HookRegistry {
    /// Creates a registry with no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pipeline with the hooks registered by `configure`.
    pub fn configure<F>(&self, configure: F)
    where
        F: FnOnce(&mut PipelineBuilder),
    {
        let mut builder = PipelineBuilder::new();
        configure(&mut builder);
        *self.current.write() = Arc::new(builder.build());
    }

    /// Appends a plugin's hooks to the current pipeline.
    pub fn use_plugin(&self, plugin: &dyn Plugin) {
        let mut current = self.current.write();
        let mut builder = PipelineBuilder::from_pipeline(&current);
        builder.add_plugin(plugin);
        *current = Arc::new(builder.build());
    }

    /// Returns the current pipeline.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Pipeline> {
        self.current.read().clone()
    }

    /// Removes every hook.
    pub fn reset(&self) {
        *self.current.write() = Arc::new(Pipeline::new());
    }
}
