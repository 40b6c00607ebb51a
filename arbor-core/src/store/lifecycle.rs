//! Store Lifecycle
//!
//! Each store instance owns at most one [`EffectScope`], created the first time
//! a watch is bound to it and kept in a reserved slot that never shows up as a
//! property. Watches hold their instance strongly, so a store with watches
//! stays alive until [`destroy_store`] stops them. Computed bindings hold the
//! instance weakly and need no teardown.

use crate::reactive::EffectScope;
use crate::value::Object;

/// The instance's scope, created on first use.
pub fn scope_for(instance: &Object) -> EffectScope {
    if let Some(scope) = instance.scope() {
        return scope;
    }
    let scope = EffectScope::new();
    instance.set_scope(scope.clone());
    scope
}

/// Whether a scope currently exists for the instance.
pub fn has_scope(instance: &Object) -> bool {
    instance.scope().is_some()
}

/// Stop every watch bound to the instance and release its scope.
///
/// A no-op for instances without watches; safe to call repeatedly.
pub fn destroy_store(instance: &Object) {
    let Some(scope) = instance.take_scope() else {
        return;
    };
    tracing::debug!(watches = scope.len(), "destroying store");
    scope.stop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_is_created_once() {
        let instance = Object::new();
        assert!(!has_scope(&instance));

        let first = scope_for(&instance);
        let second = scope_for(&instance);
        assert!(first.ptr_eq(&second));
        assert!(instance.keys().is_empty());
    }

    #[test]
    fn destroy_is_idempotent() {
        let instance = Object::new();
        destroy_store(&instance);

        let scope = scope_for(&instance);
        destroy_store(&instance);
        destroy_store(&instance);

        assert!(!scope.is_active());
        assert!(!has_scope(&instance));
    }
}
