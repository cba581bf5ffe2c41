//! Task-local baggage propagated into nested runs.

use std::collections::BTreeMap;
use std::future::Future;

tokio::task_local! {
    static CURRENT_BAGGAGE: Baggage;
}

/// Key/value pairs attached to every attempt span started beneath them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baggage {
    items: BTreeMap<String, String>,
}

impl Baggage {
    /// Creates empty baggage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the baggage of the current task, or empty baggage outside a scope.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_BAGGAGE
            .try_with(Clone::clone)
            .unwrap_or_default()
    }

    /// Adds an item, replacing any previous value for the key.
    #[must_use]
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Iterates over items in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Runs `future` with this baggage as the task's current baggage.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT_BAGGAGE.scope(self, future).await
    }
}
