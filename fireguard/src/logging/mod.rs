//! Log sink for run outcomes.
//!
//! The engine describes each notable outcome with a [`LogRecord`] and hands
//! it to a [`GuardLogger`]. The default [`TracingLogger`] forwards to the
//! `tracing` macros.

mod logger;
mod severity;

pub use logger::{
    CollectingLogger, GuardLogger, LogEntry, LogRecord, NoOpLogger, TracingLogger,
};
pub use severity::Severity;

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Returns false when a subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_only_once() {
        let _ = init_tracing(false);
        assert!(!init_tracing(true));
    }
}
