//! Copy-on-write holder for the current default options.

use parking_lot::RwLock;
use std::sync::Arc;

use super::GuardOptions;
use crate::errors::ConfigError;

/// Holds the current [`GuardOptions`] snapshot.
///
/// Updates clone the current snapshot, apply the change, validate, and swap
/// the whole `Arc` under the write lock. Readers only clone the `Arc`.
#[derive(Debug, Default)]
pub struct OptionsStore {
    current: RwLock<Arc<GuardOptions>>,
}

impl OptionsStore {
    /// Creates a store holding the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding validated options.
    pub fn with_options(options: GuardOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(options)),
        })
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<GuardOptions> {
        self.current.read().clone()
    }

    /// Applies a change to a copy of the current options.
    ///
    /// Nothing is replaced if the result fails validation.
    pub fn configure<F>(&self, configure: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut GuardOptions),
    {
        let mut current = self.current.write();
        let mut next = GuardOptions::clone(&current);
        configure(&mut next);
        next.validate()?;
        *current = Arc::new(next);
        Ok(())
    }

    /// Replaces the options wholesale.
    pub fn replace(&self, options: GuardOptions) -> Result<(), ConfigError> {
        options.validate()?;
        *self.current.write() = Arc::new(options);
        Ok(())
    }

    /// Applies a change until the returned guard is dropped.
    pub fn override_scope<F>(&self, configure: F) -> Result<OptionsOverride<'_>, ConfigError>
    where
        F: FnOnce(&mut GuardOptions),
    {
        let mut current = self.current.write();
        let previous = current.clone();
        let mut next = GuardOptions::clone(&previous);
        configure(&mut next);
        next.validate()?;
        *current = Arc::new(next);

        Ok(OptionsOverride {
            store: self,
            previous: Some(previous),
        })
    }

    /// Restores the built-in defaults.
    pub fn reset(&self) {
        *self.current.write() = Arc::new(GuardOptions::default());
    }
}

/// Restores the options captured by [`OptionsStore::override_scope`] on drop.
#[must_use = "the override is undone as soon as the guard is dropped"]
#[derive(Debug)]
pub struct OptionsOverride<'a> {
    store: &'a OptionsStore,
    previous: Option<Arc<GuardOptions>>,
}

impl Drop for OptionsOverride<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.store.current.write() = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Severity;
    use std::time::Duration;

    #[test]
    fn test_configure_replaces_snapshot() {
        let store = OptionsStore::new();
        let before = store.snapshot();

        store
            .configure(|o| o.default_retry = 3)
            .expect("valid options");

        assert_eq!(before.default_retry, 0);
        assert_eq!(store.snapshot().default_retry, 3);
    }

    #[test]
    fn test_invalid_configure_keeps_previous() {
        let store = OptionsStore::new();
        let result = store.configure(|o| {
            o.default_retry = 9;
            o.retry_base_delay = Duration::ZERO;
        });

        assert!(result.is_err());
        assert_eq!(store.snapshot().default_retry, 0);
    }

    #[test]
    fn test_override_scope_restores() {
        let store = OptionsStore::new();
        {
            let _scope = store
                .override_scope(|o| o.success_log_level = Severity::Info)
                .expect("valid override");
            assert_eq!(store.snapshot().success_log_level, Severity::Info);
        }
        assert_eq!(store.snapshot().success_log_level, Severity::Error);
    }

    #[test]
    fn test_replace_swaps_or_rejects() {
        let store = OptionsStore::new();
        store
            .replace(GuardOptions::new().with_retry_base_delay(Duration::from_millis(50)))
            .expect("valid options");
        assert_eq!(store.snapshot().retry_base_delay, Duration::from_millis(50));

        let result = store.replace(GuardOptions::new().with_retry_base_delay(Duration::ZERO));
        assert!(result.is_err());
        assert_eq!(store.snapshot().retry_base_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_reset() {
        let store = OptionsStore::new();
        store.configure(|o| o.structured_logs = true).expect("valid");
        store.reset();
        assert_eq!(*store.snapshot(), GuardOptions::default());
    }

    #[test]
    fn test_with_options_validates() {
        let invalid = GuardOptions::new().with_retry_base_delay(Duration::ZERO);
        assert!(OptionsStore::with_options(invalid).is_err());
    }
}
