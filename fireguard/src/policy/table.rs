//! Rule storage and resolution.

use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use super::Policy;
use crate::errors::ConfigError;

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A predicate over task names paired with the policy it selects.
#[derive(Clone)]
pub struct PolicyRule {
    description: String,
    predicate: Predicate,
    policy: Policy,
}

impl PolicyRule {
    /// Creates a rule from an arbitrary predicate.
    pub fn new<F>(description: impl Into<String>, predicate: F, policy: Policy) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
            policy,
        }
    }

    /// Returns true if the rule applies to `task_name`.
    #[must_use]
    pub fn matches(&self, task_name: &str) -> bool {
        (self.predicate)(task_name)
    }

    /// Returns the selected policy.
    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Returns a short description of what the rule matches.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRule")
            .field("description", &self.description)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Collects rules for [`PolicyTable::configure`].
///
/// Registration methods chain; the first invalid registration is reported
/// when the builder is finished and the whole configuration is rejected.
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    rules: Vec<PolicyRule>,
    error: Option<ConfigError>,
}

impl PolicyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule matching one task name, ignoring case.
    pub fn for_task<F>(&mut self, task_name: &str, configure: F) -> &mut Self
    where
        F: FnOnce(Policy) -> Policy,
    {
        let wanted = task_name.trim().to_lowercase();
        if wanted.is_empty() {
            return self.fail(ConfigError::EmptyTaskName);
        }
        let description = format!("task '{task_name}'");
        self.push(PolicyRule::new(
            description,
            move |name| name.to_lowercase() == wanted,
            configure(Policy::new()),
        ))
    }

    /// Adds a rule matching task names against a regular expression.
    pub fn for_pattern<F>(&mut self, pattern: &str, configure: F) -> &mut Self
    where
        F: FnOnce(Policy) -> Policy,
    {
        match Regex::new(pattern) {
            Ok(regex) => self.push(PolicyRule::new(
                format!("pattern '{pattern}'"),
                move |name| regex.is_match(name),
                configure(Policy::new()),
            )),
            Err(e) => self.fail(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Adds a rule matching any name accepted by `predicate`.
    pub fn for_predicate<P, F>(&mut self, predicate: P, configure: F) -> &mut Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        F: FnOnce(Policy) -> Policy,
    {
        self.push(PolicyRule::new("predicate", predicate, configure(Policy::new())))
    }

    fn push(&mut self, rule: PolicyRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    fn fail(&mut self, error: ConfigError) -> &mut Self {
        self.error.get_or_insert(error);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Result<Vec<PolicyRule>, ConfigError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.rules),
        }
    }
}

/// Shared, atomically replaced set of policy rules.
#[derive(Debug, Default)]
pub struct PolicyTable {
    rules: RwLock<Arc<Vec<PolicyRule>>>,
}

impl PolicyTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every rule with the ones registered by `configure`.
    ///
    /// On error the previous rules stay in place.
    pub fn configure<F>(&self, configure: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PolicyBuilder),
    {
        let mut builder = PolicyBuilder::new();
        configure(&mut builder);
        let rules = builder.build()?;
        *self.rules.write() = Arc::new(rules);
        Ok(())
    }

    /// Returns the policy of the most recently registered matching rule.
    #[must_use]
    pub fn resolve(&self, task_name: &str) -> Option<Policy> {
        let rules = self.snapshot();
        rules
            .iter()
            .rev()
            .find(|rule| rule.matches(task_name))
            .map(|rule| rule.policy().clone())
    }

    /// Returns the current rules.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<PolicyRule>> {
        self.rules.read().clone()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Returns true if no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// Removes every rule.
    pub fn reset(&self) {
        *self.rules.write() = Arc::new(Vec::new());
    }
}
