//! Effective configuration and the attempt loop.

use futures::future::{self, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, Instrument};
use uuid::Uuid;

use super::outcome::{AttemptOutcome, AttemptRecord, RunOutcome, RunReport};
use super::overrides::{ErrorCallback, RunOverrides};
use crate::backoff::{self, BackoffStrategy};
use crate::cancellation::CancellationToken;
use crate::config::GuardOptions;
use crate::errors::{normalize_error, GuardError};
use crate::events::{EventSink, TaskEvent, TASK_COMPLETED, TASK_FAILED, TASK_STARTED, TASK_TIMEOUT};
use crate::hooks::{HookContext, HookStage, Pipeline};
use crate::logging::{GuardLogger, LogRecord, Severity};
use crate::operation::{AttemptFuture, Operation};
use crate::policy::Policy;
use crate::telemetry::{AttemptTags, SpanContext, TelemetryEvent, TelemetrySink};

/// Configuration of one run after layering call arguments, the matching
/// policy and the process-wide defaults.
#[derive(Clone)]
pub struct EffectiveConfig {
    /// Resolved task name.
    pub task_name: String,
    /// Per-attempt timeout; `None` disables it.
    pub timeout: Option<Duration>,
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// Delay growth between retries.
    pub backoff: BackoffStrategy,
    /// Base retry delay.
    pub base_delay: Duration,
    /// Options snapshot taken when the run started.
    pub options: Arc<GuardOptions>,
    /// Token that stops the run.
    pub cancellation: Option<Arc<CancellationToken>>,
    /// Error callback.
    pub on_error: Option<ErrorCallback>,
}

impl EffectiveConfig {
    /// Resolves the configuration for `task_name`.
    ///
    /// Call arguments win over the policy, which wins over `options`. Work
    /// that cannot be restarted never gets retries.
    #[must_use]
    pub fn resolve(
        task_name: &str,
        supports_retry: bool,
        options: Arc<GuardOptions>,
        policy: Option<Policy>,
        overrides: RunOverrides,
    ) -> Self {
        let policy = policy.unwrap_or_default();

        let requested_retry = overrides
            .retry_count
            .or(policy.retry_count)
            .unwrap_or(options.default_retry);
        let retry_count = if supports_retry {
            requested_retry
        } else {
            if requested_retry > 0 {
                debug!(
                    task_name,
                    requested_retry,
                    "fireguard ignoring retries for {} because it was already started",
                    task_name
                );
            }
            0
        };

        let timeout = overrides
            .timeout
            .or(policy.timeout)
            .unwrap_or(options.default_timeout);

        Self {
            task_name: task_name.to_string(),
            timeout: (!timeout.is_zero()).then_some(timeout),
            retry_count,
            backoff: overrides
                .backoff
                .or(policy.backoff)
                .unwrap_or(options.default_backoff),
            base_delay: options.retry_base_delay,
            options,
            cancellation: overrides.cancellation,
            on_error: overrides.on_error,
        }
    }

    /// Total planned attempts.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_deref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

impl std::fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("task_name", &self.task_name)
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .field("backoff", &self.backoff)
            .field("base_delay", &self.base_delay)
            .field("cancellable", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

/// Collaborators captured when the run starts.
#[derive(Clone)]
pub(crate) struct Sinks {
    pub(crate) logger: Arc<dyn GuardLogger>,
    pub(crate) telemetry: Arc<dyn TelemetrySink>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) pipeline: Arc<Pipeline>,
}

enum Raced {
    Finished(anyhow::Result<()>),
    Cancelled(JoinHandle<anyhow::Result<()>>),
    TimedOut(Duration, JoinHandle<anyhow::Result<()>>),
}

enum Step {
    Stop(RunOutcome),
    Retry,
}

/// Drives one run from the first attempt to its terminal outcome.
pub(crate) struct Runner {
    run_id: Uuid,
    operation: Operation,
    config: EffectiveConfig,
    sinks: Sinks,
    span_context: SpanContext,
    history: Vec<AttemptRecord>,
}

impl Runner {
    pub(crate) fn new(
        operation: Operation,
        config: EffectiveConfig,
        sinks: Sinks,
        span_context: SpanContext,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            operation,
            config,
            sinks,
            span_context,
            history: Vec::new(),
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) async fn run(mut self) -> RunReport {
        let total = self.config.total_attempts();
        let work_token = self
            .config
            .cancellation
            .clone()
            .unwrap_or_else(|| Arc::new(CancellationToken::new()));

        let mut attempt = 1;
        let outcome = loop {
            if self.config.is_cancelled() {
                attempt -= 1;
                break RunOutcome::Cancelled;
            }

            let tags = AttemptTags::new(self.config.task_name.clone(), attempt);
            let span = self.sinks.telemetry.attempt_span(&tags, &self.span_context);
            let step = self
                .attempt(attempt, total, &tags, &work_token)
                .instrument(span)
                .await;

            match step {
                Step::Stop(outcome) => break outcome,
                Step::Retry => {
                    let delay = backoff::delay(self.config.backoff, attempt, self.config.base_delay);
                    if !wait_backoff(self.config.cancellation.clone(), delay).await {
                        self.sinks.telemetry.record(TelemetryEvent::Cancelled, &tags);
                        break RunOutcome::Cancelled;
                    }
                    attempt += 1;
                }
            }
        };

        RunReport {
            task_name: self.config.task_name,
            run_id: self.run_id,
            attempts: attempt,
            outcome,
            history: self.history,
        }
    }

    async fn attempt(
        &mut self,
        attempt: u32,
        total: u32,
        tags: &AttemptTags,
        work_token: &Arc<CancellationToken>,
    ) -> Step {
        self.sinks.telemetry.record(TelemetryEvent::Started, tags);
        self.emit(TASK_STARTED, self.event(attempt, total));
        self.invoke_hooks(HookStage::Start, attempt, total, None).await;

        let started_at = Instant::now();
        let work: AttemptFuture = match self.operation.start(work_token) {
            Ok(work) => work,
            Err(error) => future::ready(Err(anyhow::Error::new(error))).boxed(),
        };

        let work = self
            .span_context
            .baggage
            .clone()
            .scope(work)
            .instrument(tracing::Span::current());
        let raced = race(
            tokio::spawn(work),
            self.config.cancellation.clone(),
            self.config.timeout,
        )
        .await;

        match raced {
            Raced::Finished(Ok(())) => {
                self.on_completed(attempt, total, tags, started_at.elapsed())
                    .await
            }
            Raced::Finished(Err(error)) => {
                let error = self.classify(error);
                self.on_failed(attempt, total, tags, started_at.elapsed(), error)
                    .await
            }
            Raced::Cancelled(handle) => {
                self.detach(handle, attempt, total, started_at);
                self.sinks.telemetry.record(TelemetryEvent::Cancelled, tags);
                self.record(attempt, total, started_at.elapsed(), AttemptOutcome::Cancelled, None);
                Step::Stop(RunOutcome::Cancelled)
            }
            Raced::TimedOut(timeout, handle) => {
                self.detach(handle, attempt, total, started_at);
                self.on_timed_out(attempt, total, tags, started_at.elapsed(), timeout)
                    .await
            }
        }
    }

    fn classify(&self, error: anyhow::Error) -> GuardError {
        match error.downcast::<GuardError>() {
            Ok(guard_error) => guard_error,
            Err(error) => GuardError::failed(self.config.task_name.clone(), normalize_error(error)),
        }
    }

    async fn on_completed(
        &mut self,
        attempt: u32,
        total: u32,
        tags: &AttemptTags,
        duration: Duration,
    ) -> Step {
        self.sinks.telemetry.record(TelemetryEvent::Completed, tags);
        self.sinks.telemetry.record_duration(duration, tags);
        self.emit(
            TASK_COMPLETED,
            self.event(attempt, total).with_duration(duration),
        );
        self.log(
            self.config.options.success_log_level,
            attempt,
            total,
            duration,
            AttemptOutcome::Completed,
            None,
        );
        self.record(attempt, total, duration, AttemptOutcome::Completed, None);
        self.invoke_hooks(HookStage::Complete, attempt, total, None).await;
        Step::Stop(RunOutcome::Completed)
    }

    async fn on_timed_out(
        &mut self,
        attempt: u32,
        total: u32,
        tags: &AttemptTags,
        duration: Duration,
        timeout: Duration,
    ) -> Step {
        let error = Arc::new(GuardError::timeout(self.config.task_name.clone(), timeout));
        self.notify_error(&error);

        self.sinks.telemetry.record(TelemetryEvent::TimedOut, tags);
        self.sinks.telemetry.record_duration(duration, tags);
        self.log(Severity::Error, attempt, total, duration, AttemptOutcome::TimedOut, Some(&error));
        self.emit(
            TASK_TIMEOUT,
            self.event(attempt, total).with_duration(duration).with_error(&error),
        );
        self.record(attempt, total, duration, AttemptOutcome::TimedOut, Some(error.clone()));
        self.invoke_hooks(HookStage::Error, attempt, total, Some(error.clone()))
            .await;
        Step::Stop(RunOutcome::TimedOut(error))
    }

    async fn on_failed(
        &mut self,
        attempt: u32,
        total: u32,
        tags: &AttemptTags,
        duration: Duration,
        error: GuardError,
    ) -> Step {
        let error = Arc::new(error);
        if self.config.is_cancelled() {
            self.sinks.telemetry.record(TelemetryEvent::Cancelled, tags);
            self.record(attempt, total, duration, AttemptOutcome::Cancelled, Some(error));
            return Step::Stop(RunOutcome::Cancelled);
        }

        self.notify_error(&error);

        self.sinks.telemetry.record_duration(duration, tags);
        if attempt >= total {
            self.sinks.telemetry.record(TelemetryEvent::Failed, tags);
            self.log(Severity::Error, attempt, total, duration, AttemptOutcome::Failed, Some(&error));
            self.emit(
                TASK_FAILED,
                self.event(attempt, total).with_duration(duration).with_error(&error),
            );
            self.record(attempt, total, duration, AttemptOutcome::Failed, Some(error.clone()));
            self.invoke_hooks(HookStage::Error, attempt, total, Some(error.clone()))
                .await;
            return Step::Stop(RunOutcome::Failed(error));
        }

        self.sinks.telemetry.record(TelemetryEvent::Retried, tags);
        self.log(Severity::Warn, attempt, total, duration, AttemptOutcome::Retrying, Some(&error));
        self.emit(
            TASK_FAILED,
            self.event(attempt, total)
                .with_duration(duration)
                .with_error(&error)
                .will_retry(true),
        );
        self.record(attempt, total, duration, AttemptOutcome::Retrying, Some(error.clone()));
        self.invoke_hooks(HookStage::Retry, attempt, total, Some(error)).await;
        Step::Retry
    }

    /// Keeps observing an abandoned attempt so its failure is not lost.
    fn detach(
        &self,
        handle: JoinHandle<anyhow::Result<()>>,
        attempt: u32,
        total: u32,
        started_at: Instant,
    ) {
        let logger = self.sinks.logger.clone();
        let task_name = self.config.task_name.clone();
        let structured = self.config.options.structured_logs;

        tokio::spawn(async move {
            let error = match handle.await {
                Ok(Ok(())) => return,
                Ok(Err(error)) => normalize_error(error),
                Err(join_error) => anyhow::Error::new(join_error),
            };
            let error = GuardError::failed(task_name.clone(), error);
            logger.log(&LogRecord {
                severity: Severity::Debug,
                task_name: &task_name,
                attempt,
                total_attempts: total,
                duration: started_at.elapsed(),
                outcome: "Detached",
                error: Some(&error),
                structured,
            });
        });
    }

    fn notify_error(&self, error: &GuardError) {
        if let Some(on_error) = &self.config.on_error {
            on_error(error);
        }
    }

    fn log(
        &self,
        severity: Severity,
        attempt: u32,
        total: u32,
        duration: Duration,
        outcome: AttemptOutcome,
        error: Option<&GuardError>,
    ) {
        if !severity.is_enabled() {
            return;
        }
        self.sinks.logger.log(&LogRecord {
            severity,
            task_name: &self.config.task_name,
            attempt,
            total_attempts: total,
            duration,
            outcome: outcome.label(),
            error,
            structured: self.config.options.structured_logs,
        });
    }

    fn event(&self, attempt: u32, total: u32) -> TaskEvent {
        TaskEvent::new(self.run_id, self.config.task_name.clone(), attempt, total)
    }

    fn emit(&self, event_type: &str, event: TaskEvent) {
        self.sinks.events.try_emit(event_type, Some(event.to_value()));
    }

    fn record(
        &mut self,
        attempt: u32,
        total: u32,
        duration: Duration,
        outcome: AttemptOutcome,
        error: Option<Arc<GuardError>>,
    ) {
        self.history.push(AttemptRecord {
            attempt,
            total_attempts: total,
            duration,
            outcome,
            error,
        });
    }

    fn invoke_hooks(
        &self,
        stage: HookStage,
        attempt: u32,
        total: u32,
        error: Option<Arc<GuardError>>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let mut context =
            HookContext::new(stage, self.config.task_name.clone(), self.run_id, attempt, total);
        context.error = error;
        let pipeline = self.sinks.pipeline.clone();
        async move { pipeline.invoke(&context).await }
    }
}

/// Races the attempt against cancellation and the deadline, in that order
/// of priority.
async fn race(
    mut handle: JoinHandle<anyhow::Result<()>>,
    token: Option<Arc<CancellationToken>>,
    timeout: Option<Duration>,
) -> Raced {
    tokio::select! {
        biased;
        joined = &mut handle => {
            Raced::Finished(joined.unwrap_or_else(|join_error| Err(anyhow::Error::new(join_error))))
        }
        () = cancelled(token.as_deref()) => Raced::Cancelled(handle),
        () = sleep_or_pending(timeout) => Raced::TimedOut(timeout.unwrap_or_default(), handle),
    }
}

/// Returns false if the run was cancelled during the wait.
async fn wait_backoff(token: Option<Arc<CancellationToken>>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancelled(token.as_deref()) => false,
        () = tokio::time::sleep(delay) => true,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => future::pending().await,
    }
}

async fn sleep_or_pending(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventSink;
    use crate::logging::CollectingLogger;
    use crate::telemetry::NoOpTelemetry;

    fn options() -> Arc<GuardOptions> {
        Arc::new(GuardOptions::default())
    }

    #[test]
    fn test_defaults_apply_without_policy_or_overrides() {
        let config = EffectiveConfig::resolve("Sync", true, options(), None, RunOverrides::new());
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.retry_count, 0);
        assert_eq!(config.backoff, BackoffStrategy::None);
        assert_eq!(config.total_attempts(), 1);
    }

    #[test]
    fn test_call_arguments_beat_policy() {
        let policy = Policy::new().with_retry(5).with_timeout(Duration::from_secs(5));
        let overrides = RunOverrides::new().with_retry(1);
        let config = EffectiveConfig::resolve("Sync", true, options(), Some(policy), overrides);

        assert_eq!(config.retry_count, 1);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let overrides = RunOverrides::new().with_timeout(Duration::ZERO);
        let config = EffectiveConfig::resolve("Sync", true, options(), None, overrides);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_started_work_never_retries() {
        let overrides = RunOverrides::new().with_retry(3);
        let config = EffectiveConfig::resolve("Sync", false, options(), None, overrides);
        assert_eq!(config.retry_count, 0);
        assert_eq!(config.total_attempts(), 1);
    }

    #[tokio::test]
    async fn test_already_consumed_is_reported_as_failure() {
        let logger = Arc::new(CollectingLogger::new());
        let sinks = Sinks {
            logger: logger.clone(),
            telemetry: Arc::new(NoOpTelemetry),
            events: Arc::new(NoOpEventSink),
            pipeline: Arc::new(Pipeline::new()),
        };
        let mut operation = Operation::from_future(async { Ok::<(), anyhow::Error>(()) }).named("Once");
        let token = Arc::new(CancellationToken::new());
        drop(operation.start(&token));

        let config = EffectiveConfig::resolve("Once", false, options(), None, RunOverrides::new());
        let report = Runner::new(operation, config, sinks, SpanContext::detached()).run().await;

        match report.outcome {
            RunOutcome::Failed(error) => {
                assert!(matches!(*error, GuardError::AlreadyConsumed { .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(logger.entries_at(Severity::Error).len(), 1);
    }
}
