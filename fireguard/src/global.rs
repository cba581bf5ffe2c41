//! Process-wide convenience guard.
//!
//! Libraries should prefer passing a [`Guard`] explicitly. The global
//! instance exists for fire-and-forget call sites that have no context
//! object at hand.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::guard::Guard;

static GLOBAL_GUARD: RwLock<Option<Arc<Guard>>> = RwLock::new(None);

/// Returns the global guard, creating a default one on first use.
pub fn global() -> Arc<Guard> {
    if let Some(guard) = GLOBAL_GUARD.read().clone() {
        return guard;
    }
    GLOBAL_GUARD
        .write()
        .get_or_insert_with(|| Arc::new(Guard::new()))
        .clone()
}

/// Replaces the global guard. Runs already started keep the old one.
pub fn set_global(guard: Arc<Guard>) {
    *GLOBAL_GUARD.write() = Some(guard);
}

/// Drops the global guard; the next [`global`] call creates a fresh one.
pub fn clear_global() {
    *GLOBAL_GUARD.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share one test so that they cannot race on the global.
    #[test]
    fn test_global_lifecycle() {
        clear_global();
        let first = global();
        assert!(Arc::ptr_eq(&first, &global()));

        let custom = Arc::new(Guard::new());
        set_global(custom.clone());
        assert!(Arc::ptr_eq(&custom, &global()));

        clear_global();
        assert!(!Arc::ptr_eq(&custom, &global()));
        clear_global();
    }
}
