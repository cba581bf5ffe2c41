//! End-to-end tests for guarded runs.

#[cfg(test)]
mod tests {
    use crate::backoff::BackoffStrategy;
    use crate::cancellation::CancellationToken;
    use crate::engine::{AttemptOutcome, RunOutcome, RunOverrides};
    use crate::errors::{AggregateError, GuardError};
    use crate::events::{CollectingEventSink, TASK_COMPLETED, TASK_FAILED, TASK_STARTED, TASK_TIMEOUT};
    use crate::guard::Guard;
    use crate::hooks::{ErrorNotifierPlugin, HookContext, HookStage};
    use crate::logging::{CollectingLogger, Severity};
    use crate::operation::Operation;
    use crate::telemetry::{
        AttemptTags, Baggage, CollectingTelemetry, MockTelemetrySink, TelemetryEvent,
    };
    use async_trait::async_trait;
    use futures::FutureExt;
    use mockall::Sequence;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    struct Harness {
        guard: Guard,
        logger: Arc<CollectingLogger>,
        telemetry: Arc<CollectingTelemetry>,
        events: Arc<CollectingEventSink>,
        hook_calls: Arc<Mutex<HashMap<HookStage, usize>>>,
    }

    impl Harness {
        fn new() -> Self {
            let logger = Arc::new(CollectingLogger::new());
            let telemetry = Arc::new(CollectingTelemetry::new());
            let events = Arc::new(CollectingEventSink::new());
            let guard = Guard::builder()
                .with_logger(logger.clone())
                .with_telemetry(telemetry.clone())
                .with_event_sink(events.clone())
                .build()
                .expect("default options are valid");

            let hook_calls = Arc::new(Mutex::new(HashMap::new()));
            let counter = |calls: &Arc<Mutex<HashMap<HookStage, usize>>>| {
                let calls = calls.clone();
                move |ctx: HookContext| {
                    *calls.lock().entry(ctx.stage).or_insert(0) += 1;
                    futures::future::ready(())
                }
            };
            guard.configure_hooks(|b| {
                b.on_start(counter(&hook_calls))
                    .on_retry(counter(&hook_calls))
                    .on_error(counter(&hook_calls))
                    .on_complete(counter(&hook_calls));
            });

            Self {
                guard,
                logger,
                telemetry,
                events,
                hook_calls,
            }
        }

        fn hooks(&self, stage: HookStage) -> usize {
            self.hook_calls.lock().get(&stage).copied().unwrap_or(0)
        }

        fn events(&self, event_type: &str) -> usize {
            self.events.events_of_type(event_type).len()
        }
    }

    /// Factory failing on its first `failures` calls.
    fn flaky(
        failures: usize,
        calls: Arc<Mutex<Vec<Instant>>>,
    ) -> impl FnMut() -> futures::future::BoxFuture<'static, anyhow::Result<()>> + Send + 'static {
        move || {
            let calls = calls.clone();
            async move {
                let call = {
                    let mut calls = calls.lock();
                    calls.push(Instant::now());
                    calls.len()
                };
                if call <= failures {
                    anyhow::bail!("transient failure {call}");
                }
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let h = Harness::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let report = h
            .guard
            .run(
                Operation::from_factory(flaky(2, calls.clone())).named("Flaky"),
                RunOverrides::new().with_retry(2),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_completed());
        assert_eq!(report.attempts, 3);
        assert_eq!(calls.lock().len(), 3);

        assert_eq!(h.telemetry.count(TelemetryEvent::Started), 3);
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 2);
        assert_eq!(h.telemetry.count(TelemetryEvent::Completed), 1);
        assert_eq!(h.telemetry.count(TelemetryEvent::Failed), 0);

        assert_eq!(h.hooks(HookStage::Start), 3);
        assert_eq!(h.hooks(HookStage::Retry), 2);
        assert_eq!(h.hooks(HookStage::Complete), 1);
        assert_eq!(h.hooks(HookStage::Error), 0);

        assert_eq!(h.events(TASK_STARTED), 3);
        assert_eq!(h.events(TASK_FAILED), 2);
        assert_eq!(h.events(TASK_COMPLETED), 1);

        let outcomes: Vec<_> = report.history.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::Retrying,
                AttemptOutcome::Retrying,
                AttemptOutcome::Completed
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_last_error() {
        let h = Harness::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let report = h
            .guard
            .run(
                Operation::from_factory(flaky(usize::MAX, calls.clone())).named("Broken"),
                RunOverrides::new().with_retry(1),
            )
            .wait()
            .await
            .expect("run finished");

        match &report.outcome {
            RunOutcome::Failed(error) => {
                assert!(error.to_string().contains("transient failure 2"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(h.telemetry.count(TelemetryEvent::Failed), 1);
        assert_eq!(h.logger.entries_at(Severity::Warn).len(), 1);
        assert_eq!(h.logger.entries_at(Severity::Error).len(), 1);
        assert_eq!(h.hooks(HookStage::Error), 1);

        let terminal = h.events.events_of_type(TASK_FAILED);
        let will_retry: Vec<_> = terminal
            .iter()
            .filter_map(|(_, data)| data.as_ref().map(|d| d["will_retry"].clone()))
            .collect();
        assert_eq!(will_retry, vec![serde_json::json!(true), serde_json::json!(false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_never_retried() {
        let h = Harness::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();

        let slow = || async {
            sleep(Duration::from_secs(1)).await;
            Ok::<(), anyhow::Error>(())
        };
        let report = h
            .guard
            .run(
                Operation::from_factory(slow).named("Slow"),
                RunOverrides::new()
                    .with_timeout(Duration::from_millis(50))
                    .with_retry(3)
                    .with_on_error(move |error| {
                        assert!(error.is_timeout());
                        seen.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(matches!(report.outcome, RunOutcome::TimedOut(_)));
        assert_eq!(report.attempts, 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        assert_eq!(h.telemetry.count(TelemetryEvent::TimedOut), 1);
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 0);
        assert_eq!(h.events(TASK_TIMEOUT), 1);
        assert_eq!(h.hooks(HookStage::Retry), 0);
        assert_eq!(h.hooks(HookStage::Error), 1);

        let logged = h.logger.entries_at(Severity::Error);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].outcome, "Timeout");
        assert_eq!(logged[0].error_kind.as_deref(), Some("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_silent() {
        let h = Harness::new();
        let token = Arc::new(CancellationToken::new());

        let handle = h.guard.run(
            Operation::from_future(async {
                sleep(Duration::from_secs(10)).await;
                Ok::<(), anyhow::Error>(())
            })
            .named("LongRunning"),
            RunOverrides::new().with_cancellation(token.clone()),
        );

        sleep(Duration::from_millis(10)).await;
        token.cancel("shutdown");
        let report = handle.wait().await.expect("run finished");

        assert!(report.outcome.is_cancelled());
        assert!(h.logger.is_empty());
        assert_eq!(h.hooks(HookStage::Error), 0);
        assert_eq!(h.hooks(HookStage::Complete), 0);
        assert_eq!(h.telemetry.count(TelemetryEvent::Cancelled), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token_starts_nothing() {
        let h = Harness::new();
        let token = Arc::new(CancellationToken::new());
        token.cancel("before start");

        let report = h
            .guard
            .run(
                Operation::from_factory(|| async { Ok::<(), anyhow::Error>(()) }),
                RunOverrides::new().with_cancellation(token),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_cancelled());
        assert_eq!(report.attempts, 0);
        assert_eq!(h.telemetry.count(TelemetryEvent::Started), 0);
        assert_eq!(h.hooks(HookStage::Start), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let h = Harness::new();
        let token = Arc::new(CancellationToken::new());
        h.guard
            .configure(|o| o.retry_base_delay = Duration::from_secs(5))
            .expect("valid");

        let cancel_on_retry = token.clone();
        h.guard.configure_hooks(|b| {
            b.on_retry(move |_ctx| {
                let token = cancel_on_retry.clone();
                async move { token.cancel("give up") }
            });
        });

        let calls = Arc::new(Mutex::new(Vec::new()));
        let report = h
            .guard
            .run(
                Operation::from_factory(flaky(usize::MAX, calls.clone())),
                RunOverrides::new()
                    .with_retry(5)
                    .with_cancellation(token),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_cancelled());
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 1);
        assert_eq!(h.telemetry.count(TelemetryEvent::Cancelled), 1);
        assert!(h.logger.entries_at(Severity::Error).is_empty());
    }

    fn counting_on_error(calls: &Arc<AtomicUsize>) -> impl Fn(&GuardError) + Send + Sync + 'static {
        let calls = calls.clone();
        move |_error: &GuardError| {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_cancellation_counts_as_cancelled() {
        let h = Harness::new();
        let token = Arc::new(CancellationToken::new());
        let on_error_calls = Arc::new(AtomicUsize::new(0));

        let handle = h.guard.run(
            Operation::from_cancellable(|token: Arc<CancellationToken>| async move {
                token.cancelled().await;
                Err::<(), _>(anyhow::anyhow!("stopped by token"))
            }),
            RunOverrides::new()
                .with_retry(2)
                .with_cancellation(token.clone())
                .with_on_error(counting_on_error(&on_error_calls)),
        );

        sleep(Duration::from_millis(5)).await;
        token.cancel("shutdown");
        let report = handle.wait().await.expect("run finished");

        assert!(report.outcome.is_cancelled());
        assert_eq!(on_error_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 0);
        assert_eq!(h.telemetry.count(TelemetryEvent::Failed), 0);
        assert_eq!(h.hooks(HookStage::Error), 0);
        assert!(h.logger.entries_at(Severity::Error).is_empty());
        assert!(h.logger.entries_at(Severity::Warn).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_that_cancels_then_fails_reports_no_error() {
        let h = Harness::new();
        let token = Arc::new(CancellationToken::new());
        let on_error_calls = Arc::new(AtomicUsize::new(0));

        let report = h
            .guard
            .run(
                Operation::from_cancellable(|token: Arc<CancellationToken>| async move {
                    token.cancel("giving up");
                    Err::<(), _>(anyhow::anyhow!("aborted because cancelled"))
                })
                .named("SelfCancelling"),
                RunOverrides::new()
                    .with_retry(2)
                    .with_cancellation(token.clone())
                    .with_on_error(counting_on_error(&on_error_calls)),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(token.is_cancelled());
        assert!(report.outcome.is_cancelled());
        assert_eq!(report.attempts, 1);
        assert_eq!(on_error_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.telemetry.count(TelemetryEvent::Cancelled), 1);
        assert_eq!(h.telemetry.count(TelemetryEvent::Failed), 0);
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 0);
        assert_eq!(h.hooks(HookStage::Error), 0);
        assert_eq!(h.hooks(HookStage::Retry), 0);
        assert_eq!(h.events(TASK_FAILED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_callback_sees_plain_failures() {
        let h = Harness::new();
        let on_error_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(Mutex::new(Vec::new()));

        let report = h
            .guard
            .run(
                Operation::from_factory(flaky(usize::MAX, calls.clone())),
                RunOverrides::new()
                    .with_retry(1)
                    .with_on_error(counting_on_error(&on_error_calls)),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(matches!(report.outcome, RunOutcome::Failed(_)));
        assert_eq!(on_error_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_applies_to_its_task_only_and_latest_wins() {
        let h = Harness::new();
        h.guard
            .configure_policies(|b| {
                b.for_task("Report", |p| p.with_timeout(Duration::from_secs(5)))
                    .for_task("Report", |p| p.with_timeout(Duration::from_millis(10)));
            })
            .expect("valid policies");

        let work = || async {
            sleep(Duration::from_millis(100)).await;
            Ok::<(), anyhow::Error>(())
        };

        let report = h
            .guard
            .run(Operation::from_factory(work).named("Report"), RunOverrides::new())
            .wait()
            .await
            .expect("run finished");
        match &report.outcome {
            RunOutcome::TimedOut(error) => match error.as_ref() {
                GuardError::Timeout { timeout, .. } => {
                    assert_eq!(*timeout, Duration::from_millis(10));
                }
                other => panic!("unexpected error {other:?}"),
            },
            other => panic!("expected timeout, got {other:?}"),
        }

        let other = h
            .guard
            .run(Operation::from_factory(work).named("Other"), RunOverrides::new())
            .wait()
            .await
            .expect("run finished");
        assert!(other.outcome.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_delays() {
        let h = Harness::new();
        h.guard
            .configure(|o| {
                o.retry_base_delay = Duration::from_millis(50);
                o.success_log_level = Severity::Info;
            })
            .expect("valid");

        let calls = Arc::new(Mutex::new(Vec::new()));
        let report = h
            .guard
            .run(
                Operation::from_factory(flaky(2, calls.clone())).named("Linear"),
                RunOverrides::new()
                    .with_retry(2)
                    .with_backoff(BackoffStrategy::Linear),
            )
            .wait()
            .await
            .expect("run finished");
        assert!(report.outcome.is_completed());

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(first_gap >= Duration::from_millis(50) && first_gap < Duration::from_millis(60));
        assert!(second_gap >= Duration::from_millis(100) && second_gap < Duration::from_millis(110));

        assert_eq!(h.logger.entries_at(Severity::Warn).len(), 2);
        assert_eq!(h.logger.entries_at(Severity::Info).len(), 1);
    }

    #[tokio::test]
    async fn test_success_log_can_be_disabled() {
        let h = Harness::new();
        h.guard
            .configure(|o| o.success_log_level = Severity::None)
            .expect("valid");

        let report = h
            .guard
            .run(
                Operation::from_future(async { Ok::<(), anyhow::Error>(()) }),
                RunOverrides::new(),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_completed());
        assert!(h.logger.is_empty());
        assert_eq!(h.events(TASK_COMPLETED), 1);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mailbox full")]
    struct MailboxFull;

    #[tokio::test]
    async fn test_single_use_failure_carries_original_error() {
        let h = Harness::new();

        let report = h
            .guard
            .run(
                Operation::from_future(async {
                    Err::<(), _>(AggregateError::new(vec![anyhow::Error::new(MailboxFull)]))
                })
                .named("Mailer"),
                RunOverrides::new().with_retry(4),
            )
            .wait()
            .await
            .expect("run finished");

        assert_eq!(report.attempts, 1);
        let cause = report
            .outcome
            .error()
            .and_then(GuardError::cause)
            .expect("failure cause");
        assert!(cause.downcast_ref::<MailboxFull>().is_some());
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 0);
    }

    #[tokio::test]
    async fn test_hook_panic_aborts_run() {
        let h = Harness::new();
        h.guard.configure_hooks(|b| {
            b.on_start(|_ctx| async { panic!("hook exploded") });
        });

        let result = h
            .guard
            .run(
                Operation::from_future(async { Ok::<(), anyhow::Error>(()) }).named("Hooked"),
                RunOverrides::new(),
            )
            .wait()
            .await;

        match result {
            Err(GuardError::RunAborted { task_name, reason }) => {
                assert_eq!(task_name, "Hooked");
                assert_eq!(reason, "hook exploded");
            }
            other => panic!("expected RunAborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_factory_is_a_failed_attempt() {
        let h = Harness::new();
        let report = h
            .guard
            .run(
                Operation::from_factory(|| -> futures::future::Ready<anyhow::Result<()>> {
                    panic!("factory exploded")
                })
                .named("Panicky"),
                RunOverrides::new(),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(matches!(report.outcome, RunOutcome::Failed(_)));
        assert_eq!(h.telemetry.count(TelemetryEvent::Failed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_keeps_running_detached() {
        let h = Harness::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let marker = finished.clone();

        let report = h
            .guard
            .run(
                Operation::from_future(async move {
                    sleep(Duration::from_millis(200)).await;
                    marker.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::anyhow!("late failure"))
                })
                .named("Detached"),
                RunOverrides::new().with_timeout(Duration::from_millis(50)),
            )
            .wait()
            .await
            .expect("run finished");
        assert!(matches!(report.outcome, RunOutcome::TimedOut(_)));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        let detached = h.logger.entries_at(Severity::Debug);
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].outcome, "Detached");
        assert!(detached[0].duration >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_error_notifier_plugin_sees_terminal_errors() {
        let h = Harness::new();
        let notified = Arc::new(Mutex::new(Vec::new()));
        let sink = notified.clone();
        h.guard.use_plugin(&ErrorNotifierPlugin::new(move |ctx| {
            sink.lock().push(ctx.task_name.clone());
        }));

        h.guard
            .run(
                Operation::from_future(async { Err::<(), _>(anyhow::anyhow!("boom")) })
                    .named("Notify"),
                RunOverrides::new(),
            )
            .wait()
            .await
            .expect("run finished");

        assert_eq!(*notified.lock(), vec!["Notify".to_string()]);
        assert_eq!(h.hooks(HookStage::Error), 1);
    }

    #[tokio::test]
    async fn test_baggage_flows_into_work() {
        let h = Harness::new();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();

        let handle = Baggage::new()
            .with_item("tenant", "acme")
            .scope(async {
                h.guard.run(
                    Operation::from_future(async move {
                        *slot.lock() = Baggage::current().get("tenant").map(str::to_string);
                        Ok::<(), anyhow::Error>(())
                    }),
                    RunOverrides::new(),
                )
            })
            .await;
        handle.wait().await.expect("run finished");

        assert_eq!(seen.lock().as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_telemetry_records_started_then_completed() {
        let mut mock = MockTelemetrySink::new();
        let mut seq = Sequence::new();
        mock.expect_attempt_span()
            .returning(|_, _| tracing::Span::none());
        mock.expect_record()
            .withf(|event: &TelemetryEvent, tags: &AttemptTags| {
                *event == TelemetryEvent::Started && tags.task_name == "Mocked" && tags.attempt == 1
            })
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_record()
            .withf(|event: &TelemetryEvent, _tags: &AttemptTags| *event == TelemetryEvent::Completed)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_record_duration().times(1).return_const(());

        let guard = Guard::builder()
            .with_logger(Arc::new(CollectingLogger::new()))
            .with_telemetry(Arc::new(mock))
            .build()
            .expect("valid");

        let report = guard
            .run(
                Operation::from_future(async { Ok::<(), anyhow::Error>(()) }).named("Mocked"),
                RunOverrides::new(),
            )
            .wait()
            .await
            .expect("run finished");
        assert!(report.outcome.is_completed());
    }

    #[tokio::test]
    async fn test_telemetry_precedes_hooks() {
        let telemetry = Arc::new(CollectingTelemetry::new());
        let guard = Guard::builder()
            .with_logger(Arc::new(CollectingLogger::new()))
            .with_telemetry(telemetry.clone())
            .build()
            .expect("valid");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let observe = |event: TelemetryEvent| {
            let telemetry = telemetry.clone();
            let seen = seen.clone();
            move |ctx: HookContext| {
                seen.lock().push((ctx.stage, telemetry.count(event)));
                futures::future::ready(())
            }
        };
        guard.configure_hooks(|b| {
            b.on_start(observe(TelemetryEvent::Started))
                .on_complete(observe(TelemetryEvent::Completed));
        });

        let report = guard
            .run(
                Operation::from_future(async { Ok::<(), anyhow::Error>(()) }).named("Ordered"),
                RunOverrides::new(),
            )
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_completed());
        assert_eq!(
            *seen.lock(),
            vec![(HookStage::Start, 1), (HookStage::Complete, 1)]
        );
    }

    #[async_trait]
    trait Notifier: Send + Sync {
        async fn notify(&self, user: &str) -> anyhow::Result<()>;
    }

    struct FlakyNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, user: &str) -> anyhow::Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("gateway unavailable for {user}");
            }
            Ok(())
        }
    }

    /// Hand-written wrapper that guards every call of a service.
    struct GuardedNotifier {
        inner: Arc<dyn Notifier>,
        guard: Arc<Guard>,
    }

    impl GuardedNotifier {
        fn notify(&self, user: &str) -> crate::engine::RunHandle {
            let inner = self.inner.clone();
            let user = user.to_string();
            let operation = Operation::from_factory(move || {
                let inner = inner.clone();
                let user = user.clone();
                async move { inner.notify(&user).await }
            })
            .named("Notifier.notify");
            self.guard.run(operation, RunOverrides::new().with_retry(1))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hand_written_interface_wrapper() {
        let h = Harness::new();
        let notifier = Arc::new(FlakyNotifier {
            calls: AtomicUsize::new(0),
        });
        let guarded = GuardedNotifier {
            inner: notifier.clone(),
            guard: Arc::new(h.guard),
        };

        let report = guarded
            .notify("ada")
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_completed());
        assert_eq!(report.task_name, "Notifier.notify");
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.telemetry.count(TelemetryEvent::Retried), 1);
    }
}
