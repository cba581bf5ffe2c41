//! The guard context object.

use std::fmt;
use std::sync::Arc;

use crate::config::{GuardOptions, OptionsOverride, OptionsStore};
use crate::engine::{EffectiveConfig, RunHandle, RunOverrides, Runner, Sinks};
use crate::errors::ConfigError;
use crate::events::{EventSink, NoOpEventSink};
use crate::hooks::{HookRegistry, PipelineBuilder, Plugin};
use crate::logging::{GuardLogger, TracingLogger};
use crate::operation::Operation;
use crate::policy::{PolicyBuilder, PolicyTable};
use crate::telemetry::{MetricsTelemetry, SpanContext, TelemetrySink};

/// Runs operations in the background with timeouts, retries and reporting.
///
/// Options, policies and hooks can be reconfigured at any time; every run
/// works on the snapshot taken when it started.
pub struct Guard {
    options: OptionsStore,
    policies: PolicyTable,
    hooks: HookRegistry,
    logger: Arc<dyn GuardLogger>,
    telemetry: Arc<dyn TelemetrySink>,
    events: Arc<dyn EventSink>,
}

impl Guard {
    /// Creates a guard with default options, tracing logs and `metrics`
    /// telemetry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: OptionsStore::new(),
            policies: PolicyTable::new(),
            hooks: HookRegistry::new(),
            logger: Arc::new(TracingLogger),
            telemetry: Arc::new(MetricsTelemetry),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Starts building a guard.
    #[must_use]
    pub fn builder() -> GuardBuilder {
        GuardBuilder::default()
    }

    /// Starts `operation` in the background and returns immediately.
    ///
    /// Never fails synchronously; every failure is reported through the
    /// run's logs, telemetry, hooks and the [`RunHandle`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn run(&self, operation: Operation, mut overrides: RunOverrides) -> RunHandle {
        let operation = match overrides.task_name.take() {
            Some(name) => operation.named(name),
            None => operation,
        };
        let task_name = operation.name().to_string();

        let config = EffectiveConfig::resolve(
            &task_name,
            operation.supports_retry(),
            self.options.snapshot(),
            self.policies.resolve(&task_name),
            overrides,
        );
        let sinks = Sinks {
            logger: self.logger.clone(),
            telemetry: self.telemetry.clone(),
            events: self.events.clone(),
            pipeline: self.hooks.snapshot(),
        };
        let span_context = SpanContext::capture();
        let baggage = span_context.baggage.clone();

        let runner = Runner::new(operation, config, sinks, span_context);
        let run_id = runner.run_id();
        let join = tokio::spawn(baggage.scope(runner.run()));
        RunHandle::new(task_name, run_id, join)
    }

    /// Returns the current options.
    #[must_use]
    pub fn options(&self) -> Arc<GuardOptions> {
        self.options.snapshot()
    }

    /// Updates the options; invalid results are rejected.
    pub fn configure<F>(&self, configure: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut GuardOptions),
    {
        self.options.configure(configure)
    }

    /// Replaces the options wholesale, e.g. with options loaded from JSON or
    /// the environment. Invalid options are rejected.
    pub fn replace_options(&self, options: GuardOptions) -> Result<(), ConfigError> {
        self.options.replace(options)
    }

    /// Applies option changes until the returned guard is dropped.
    pub fn override_options<F>(&self, configure: F) -> Result<OptionsOverride<'_>, ConfigError>
    where
        F: FnOnce(&mut GuardOptions),
    {
        self.options.override_scope(configure)
    }

    /// Replaces every policy rule.
    pub fn configure_policies<F>(&self, configure: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PolicyBuilder),
    {
        self.policies.configure(configure)
    }

    /// Returns the policy table.
    #[must_use]
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Replaces every hook.
    pub fn configure_hooks<F>(&self, configure: F)
    where
        F: FnOnce(&mut PipelineBuilder),
    {
        self.hooks.configure(configure);
    }

    /// Appends a plugin's hooks.
    pub fn use_plugin(&self, plugin: &dyn Plugin) {
        self.hooks.use_plugin(plugin);
    }

    /// Returns the hook registry.
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Checks the current options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.snapshot().validate()
    }

    /// Restores default options and removes every policy and hook.
    pub fn reset(&self) {
        self.options.reset();
        self.policies.reset();
        self.hooks.reset();
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("options", &self.options.snapshot())
            .field("policies", &self.policies.len())
            .field("hooks", &self.hooks.snapshot())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Guard`].
#[derive(Default)]
pub struct GuardBuilder {
    options: Option<GuardOptions>,
    logger: Option<Arc<dyn GuardLogger>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    events: Option<Arc<dyn EventSink>>,
}

impl GuardBuilder {
    /// Sets the initial options.
    #[must_use]
    pub fn with_options(mut self, options: GuardOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the log sink.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn GuardLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets the structured event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the guard, validating the options.
    pub fn build(self) -> Result<Guard, ConfigError> {
        let defaults = Guard::new();
        let options = match self.options {
            Some(options) => OptionsStore::with_options(options)?,
            None => defaults.options,
        };
        Ok(Guard {
            options,
            policies: defaults.policies,
            hooks: defaults.hooks,
            logger: self.logger.unwrap_or(defaults.logger),
            telemetry: self.telemetry.unwrap_or(defaults.telemetry),
            events: self.events.unwrap_or(defaults.events),
        })
    }
}

impl fmt::Debug for GuardBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardBuilder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
