//! Attempt records, run reports and the completion handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::GuardError;

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The work finished successfully.
    Completed,
    /// The deadline passed first.
    TimedOut,
    /// The final attempt failed.
    Failed,
    /// The attempt failed and another one follows.
    Retrying,
    /// The run was cancelled while the attempt was outstanding.
    Cancelled,
}

impl AttemptOutcome {
    /// Label used in log records.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::TimedOut => "Timeout",
            Self::Failed => "Failed",
            Self::Retrying => "Retry",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// One executed attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// 1-based attempt index.
    pub attempt: u32,
    /// Total planned attempts.
    pub total_attempts: u32,
    /// Time from start of the work until its outcome was known.
    pub duration: Duration,
    /// How it ended.
    pub outcome: AttemptOutcome,
    /// The captured error, if any.
    pub error: Option<Arc<GuardError>>,
}

/// Terminal state of a run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// An attempt completed.
    Completed,
    /// An attempt timed out. Timeouts are never retried.
    TimedOut(Arc<GuardError>),
    /// Every attempt failed; carries the last error.
    Failed(Arc<GuardError>),
    /// The run stopped because its token was cancelled.
    Cancelled,
}

impl RunOutcome {
    /// Returns true for [`RunOutcome::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true for [`RunOutcome::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the terminal error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&GuardError> {
        match self {
            Self::TimedOut(error) | Self::Failed(error) => Some(error),
            Self::Completed | Self::Cancelled => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::TimedOut(error) => write!(f, "timed out: {error}"),
            Self::Failed(error) => write!(f, "failed: {error}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Resolved task name.
    pub task_name: String,
    /// Identifier of the run.
    pub run_id: Uuid,
    /// Number of attempts that were started.
    pub attempts: u32,
    /// Terminal state.
    pub outcome: RunOutcome,
    /// Every executed attempt, in order.
    pub history: Vec<AttemptRecord>,
}

/// Handle to a run in flight.
///
/// Dropping the handle does not stop the run.
#[derive(Debug)]
pub struct RunHandle {
    task_name: String,
    run_id: Uuid,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    pub(crate) fn new(task_name: String, run_id: Uuid, join: JoinHandle<RunReport>) -> Self {
        Self {
            task_name,
            run_id,
            join,
        }
    }

    /// Resolved task name.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Identifier of the run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns true once the run has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to stop.
    ///
    /// Failures of the guarded work are reported in the [`RunReport`]. An
    /// error is returned only when the run task itself died, for example
    /// because a hook panicked.
    pub async fn wait(self) -> Result<RunReport, GuardError> {
        self.join.await.map_err(|join_error| {
            let reason = if join_error.is_panic() {
                let panic = join_error.into_panic();
                panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "run task panicked".to_string())
            } else {
                "run task was cancelled".to_string()
            };
            GuardError::RunAborted {
                task_name: self.task_name,
                reason,
            }
        })
    }
}
