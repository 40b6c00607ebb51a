//! Effect Scopes
//!
//! A scope groups watches so they can be stopped together. Watches created
//! while [`EffectScope::run`] executes are recorded in the innermost running
//! scope.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::watch::WatchHandle;

thread_local! {
    static ACTIVE_SCOPES: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner {
    active: Cell<bool>,
    watches: RefCell<Vec<WatchHandle>>,
}

/// A disposable group of watches.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

impl EffectScope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                active: Cell::new(true),
                watches: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Run `f` with this scope collecting new watches.
    ///
    /// Returns `None` without running `f` once the scope is stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            return None;
        }

        ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().push(self.clone()));
        let _guard = ScopeGuard;
        Some(f())
    }

    /// Stop every watch in the scope. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let watches = std::mem::take(&mut *self.inner.watches.borrow_mut());
        tracing::debug!(watches = watches.len(), "stopping effect scope");
        for watch in watches {
            watch.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of live watches owned by the scope.
    pub fn len(&self) -> usize {
        self.inner
            .watches
            .borrow()
            .iter()
            .filter(|watch| watch.is_active())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn adopt(&self, watch: &WatchHandle) {
        if !self.is_active() {
            watch.stop();
            return;
        }
        // `once` watches stop themselves; drop their handles.
        let mut watches = self.inner.watches.borrow_mut();
        watches.retain(WatchHandle::is_active);
        if watch.is_active() {
            watches.push(watch.clone());
        }
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("watches", &self.len())
            .finish()
    }
}

/// Pops the running scope, even on panic.
struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let _ = ACTIVE_SCOPES.try_with(|scopes| scopes.borrow_mut().pop());
    }
}

/// Hand a new watch to the innermost running scope, if any.
pub(crate) fn record_watch(watch: &WatchHandle) {
    let current = ACTIVE_SCOPES.with(|scopes| scopes.borrow().last().cloned());
    if let Some(scope) = current {
        scope.adopt(watch);
    }
}
