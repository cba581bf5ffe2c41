//! Fire-and-forget extension traits.
//!
//! ```rust,ignore
//! use fireguard::prelude::*;
//!
//! send_welcome_email(user).fire_and_forget();
//!
//! (move || sync_inventory(store.clone()))
//!     .fire_and_forget_retrying(RunOverrides::new().with_retry(3));
//! ```

use std::future::Future;

use crate::engine::{RunHandle, RunOverrides};
use crate::global::global;
use crate::guard::Guard;
use crate::operation::Operation;

/// Runs single-use work in the background.
///
/// Implemented for every `Send` future returning a `Result`, and for
/// [`Operation`]. Wrap a spawned task with [`Operation::from_handle`] so that
/// the task's own error, not only a panic, is reported.
pub trait FireAndForget: Sized {
    /// Converts into an operation.
    fn into_operation(self) -> Operation;

    /// Runs on the global guard with default settings.
    fn fire_and_forget(self) -> RunHandle {
        self.fire_and_forget_with(RunOverrides::default())
    }

    /// Runs on the global guard.
    fn fire_and_forget_with(self, overrides: RunOverrides) -> RunHandle {
        global().run(self.into_operation(), overrides)
    }

    /// Runs on a specific guard.
    fn fire_and_forget_on(self, guard: &Guard, overrides: RunOverrides) -> RunHandle {
        guard.run(self.into_operation(), overrides)
    }
}

impl<F, T, E> FireAndForget for F
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    fn into_operation(self) -> Operation {
        Operation::from_future(self)
    }
}

impl FireAndForget for Operation {
    fn into_operation(self) -> Operation {
        self
    }
}

/// Runs a restartable factory in the background, retrying per policy.
pub trait FireAndForgetFactory: Sized {
    /// Converts into an operation.
    fn into_retrying_operation(self) -> Operation;

    /// Runs on the global guard.
    fn fire_and_forget_retrying(self, overrides: RunOverrides) -> RunHandle {
        global().run(self.into_retrying_operation(), overrides)
    }

    /// Runs on a specific guard.
    fn fire_and_forget_retrying_on(self, guard: &Guard, overrides: RunOverrides) -> RunHandle {
        guard.run(self.into_retrying_operation(), overrides)
    }
}

impl<F, Fut, T, E> FireAndForgetFactory for F
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    fn into_retrying_operation(self) -> Operation {
        Operation::from_factory(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::telemetry::CollectingTelemetry;
    use crate::telemetry::TelemetryEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quiet_guard(telemetry: Arc<CollectingTelemetry>) -> Guard {
        Guard::builder()
            .with_logger(Arc::new(NoOpLogger))
            .with_telemetry(telemetry)
            .build()
            .expect("default options are valid")
    }

    #[tokio::test]
    async fn test_future_fire_and_forget_on_guard() {
        let telemetry = Arc::new(CollectingTelemetry::new());
        let guard = quiet_guard(telemetry.clone());

        let report = async { Ok::<_, anyhow::Error>("done") }
            .fire_and_forget_on(&guard, RunOverrides::new().with_task_name("Inline"))
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_completed());
        assert_eq!(report.task_name, "Inline");
        assert_eq!(telemetry.count(TelemetryEvent::Completed), 1);
    }

    #[tokio::test]
    async fn test_join_handle_is_single_use() {
        let telemetry = Arc::new(CollectingTelemetry::new());
        let guard = quiet_guard(telemetry.clone());
        let handle = tokio::spawn(async { Err::<(), _>(anyhow::anyhow!("nope")) });

        let report = Operation::from_handle(handle)
            .fire_and_forget_on(&guard, RunOverrides::new().with_retry(3))
            .wait()
            .await
            .expect("run finished");

        assert_eq!(report.attempts, 1);
        assert_eq!(telemetry.count(TelemetryEvent::Retried), 0);
        assert_eq!(telemetry.count(TelemetryEvent::Failed), 1);
        assert!(report
            .outcome
            .error()
            .and_then(|e| e.cause())
            .is_some_and(|cause| cause.to_string() == "nope"));
    }

    #[tokio::test]
    async fn test_factory_retries() {
        let telemetry = Arc::new(CollectingTelemetry::new());
        let guard = quiet_guard(telemetry.clone());
        guard
            .configure(|o| o.retry_base_delay = std::time::Duration::from_millis(1))
            .expect("valid");

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory = move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("first try fails");
                }
                Ok(())
            }
        };

        let report = factory
            .fire_and_forget_retrying_on(&guard, RunOverrides::new().with_retry(1))
            .wait()
            .await
            .expect("run finished");

        assert!(report.outcome.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
