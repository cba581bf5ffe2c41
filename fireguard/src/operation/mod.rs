//! Uniform view over the three shapes of guarded work.
//!
//! - an already-started unit of work (a future or a spawned task), which can
//!   be consumed exactly once and therefore never retried;
//! - a zero-argument factory, invoked afresh for every attempt;
//! - a cancellation-aware factory, which also receives the run's token.
//!
//! Panics raised by a factory or while polling its future are captured and
//! reported as failed attempts, so the engine has a single failure path.

mod name;

pub use name::{declared_identifier, resolve_name, FALLBACK_NAME};

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::cancellation::CancellationToken;
use crate::errors::GuardError;

/// Future produced by a single attempt.
pub type AttemptFuture = BoxFuture<'static, anyhow::Result<()>>;

type Factory = Box<dyn FnMut(Arc<CancellationToken>) -> AttemptFuture + Send>;

enum Work {
    /// Single-use work; `None` once consumed.
    Started(Option<AttemptFuture>),
    Factory(Factory),
}

/// One guarded unit of work.
pub struct Operation {
    work: Work,
    explicit_name: Option<String>,
    hint: Option<String>,
    declared: Option<String>,
    name: String,
}

impl Operation {
    /// Wraps work that is already in flight (or at least already built).
    ///
    /// The operation can be started only once and does not support retries.
    pub fn from_future<F, T, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        Self::new(Work::Started(Some(guard_future(future))), None)
    }

    /// Wraps a spawned tokio task. A panic inside the task is reported as a
    /// failure.
    pub fn from_handle<T, E>(handle: JoinHandle<Result<T, E>>) -> Self
    where
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let future = async move {
            match handle.await {
                Ok(result) => result.map(|_| ()).map_err(Into::into),
                Err(join_error) if join_error.is_panic() => {
                    Err(panic_error(join_error.into_panic()))
                }
                Err(join_error) => Err(anyhow::Error::new(join_error)),
            }
        };
        Self::new(Work::Started(Some(future.boxed())), None)
    }

    /// Wraps a factory invoked once per attempt.
    pub fn from_factory<F, Fut, T, E>(mut factory: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        let declared = std::any::type_name::<F>();
        let factory: Factory = Box::new(move |_token| guard_future(factory()));
        Self::new(Work::Factory(factory), Some(declared))
    }

    /// Wraps a factory that receives the run's cancellation token.
    pub fn from_cancellable<F, Fut, T, E>(mut factory: F) -> Self
    where
        F: FnMut(Arc<CancellationToken>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        let declared = std::any::type_name::<F>();
        let factory: Factory = Box::new(move |token| guard_future(factory(token)));
        Self::new(Work::Factory(factory), Some(declared))
    }

    fn new(work: Work, declared: Option<&str>) -> Self {
        let mut operation = Self {
            work,
            explicit_name: None,
            hint: None,
            declared: declared.map(str::to_string),
            name: String::new(),
        };
        operation.refresh_name();
        operation
    }

    /// Sets an explicit display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.explicit_name = Some(name.into());
        self.refresh_name();
        self
    }

    /// Attaches a context hint used when no explicit name is given.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self.refresh_name();
        self
    }

    fn refresh_name(&mut self) {
        self.name = resolve_name(
            self.explicit_name.as_deref(),
            self.hint.as_deref(),
            self.declared.as_deref(),
        );
    }

    /// Returns the resolved display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if each attempt can start fresh work.
    #[must_use]
    pub fn supports_retry(&self) -> bool {
        matches!(self.work, Work::Factory(_))
    }

    /// Starts one attempt.
    ///
    /// Single-use operations fail with [`GuardError::AlreadyConsumed`] on the
    /// second call. A factory that panics yields an already-failed attempt.
    pub fn start(&mut self, token: &Arc<CancellationToken>) -> Result<AttemptFuture, GuardError> {
        let started = match &mut self.work {
            Work::Started(slot) => slot.take(),
            Work::Factory(factory) => {
                let token = token.clone();
                let attempt = std::panic::catch_unwind(AssertUnwindSafe(|| factory(token)))
                    .unwrap_or_else(|panic| future::ready(Err(panic_error(panic))).boxed());
                Some(attempt)
            }
        };

        started.ok_or_else(|| GuardError::AlreadyConsumed {
            task_name: self.name.clone(),
        })
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("supports_retry", &self.supports_retry())
            .finish_non_exhaustive()
    }
}

fn guard_future<F, T, E>(future: F) -> AttemptFuture
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .map(|outcome| match outcome {
            Ok(result) => result.map(|_| ()).map_err(Into::into),
            Err(panic) => Err(panic_error(panic)),
        })
        .boxed()
}

fn panic_error(panic: Box<dyn Any + Send>) -> anyhow::Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow::anyhow!("operation panicked: {message}")
}
