//! Per-task overrides selected by name.
//!
//! Rules are matched against the resolved task name in reverse registration
//! order, so the most recently registered matching rule wins.

mod table;

pub use table::{PolicyBuilder, PolicyRule, PolicyTable};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::BackoffStrategy;

/// Overrides applied to matching tasks. Unset fields fall through to the
/// process-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Per-attempt timeout; zero disables the timeout.
    pub timeout: Option<Duration>,
    /// Number of retries after the first attempt.
    pub retry_count: Option<u32>,
    /// Delay growth between retries.
    pub backoff: Option<BackoffStrategy>,
}

impl Policy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disables the timeout for matching tasks.
    #[must_use]
    pub fn without_timeout(self) -> Self {
        self.with_timeout(Duration::ZERO)
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

    /// Returns true if the policy overrides nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeout.is_none() && self.retry_count.is_none() && self.backoff.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let policy = Policy::new()
            .with_timeout(Duration::from_secs(5))
            .with_retry(2)
            .with_backoff(BackoffStrategy::Linear);

        assert_eq!(policy.timeout, Some(Duration::from_secs(5)));
        assert_eq!(policy.retry_count, Some(2));
        assert_eq!(policy.backoff, Some(BackoffStrategy::Linear));
        assert!(!policy.is_empty());
    }

    #[test]
    fn test_without_timeout() {
        assert_eq!(Policy::new().without_timeout().timeout, Some(Duration::ZERO));
        assert!(Policy::new().is_empty());
    }
}
