//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the computed runs its getter and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns the cache.
//!
//! 3. When a dependency changes, the runtime marks the computed dirty. The
//!    computed in turn notifies whatever read it, so watches on a computed
//!    value re-evaluate.
//!
//! 4. On next access, the getter runs again. Values are never re-derived
//!    eagerly.
//!
//! An optional setter makes the computed writable. Writing does not touch the
//! cache; the setter is expected to change the dependencies the getter reads.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, SubscriberId};
use crate::error::{Result, StoreError};
use crate::value::Value;

type ComputedGetter = Rc<dyn Fn() -> Value>;
type ComputedSetter = Rc<dyn Fn(Value) -> Result<()>>;

/// Dirty state for a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or nothing was computed yet).
    Dirty,
}

struct ComputedInner {
    subscriber_id: SubscriberId,

    /// Source that readers of this computed depend on.
    source: SourceId,

    getter: ComputedGetter,
    setter: Option<ComputedSetter>,

    value: RefCell<Option<Value>>,
    state: Cell<ComputedState>,

    /// Number of getter evaluations, for diagnostics.
    evaluations: Cell<usize>,

    registration: RefCell<Option<ReactiveHandle>>,
}

impl Reactive for ComputedInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {
        if self.state.get() == ComputedState::Clean {
            self.state.set(ComputedState::Dirty);
            Runtime::trigger(self.source);
        }
    }

    fn schedule(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

impl Drop for ComputedInner {
    fn drop(&mut self) {
        Runtime::forget_source(self.source);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let doubled = Computed::new(move || Value::from(count.get("n").as_f64().unwrap_or(0.0) * 2.0));
/// assert_eq!(doubled.get(), Value::from(2));
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Rc<ComputedInner>,
}

impl Computed {
    /// Create a read-only computed value.
    ///
    /// The getter is not run immediately. It runs on first access.
    pub fn new<G>(getter: G) -> Self
    where
        G: Fn() -> Value + 'static,
    {
        Self::build(Rc::new(getter), None)
    }

    /// Create a writable computed value.
    pub fn with_setter<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn() -> Value + 'static,
        S: Fn(Value) -> Result<()> + 'static,
    {
        Self::build(Rc::new(getter), Some(Rc::new(setter)))
    }

    fn build(getter: ComputedGetter, setter: Option<ComputedSetter>) -> Self {
        let inner = Rc::new(ComputedInner {
            subscriber_id: SubscriberId::new(),
            source: SourceId::new(),
            getter,
            setter,
            value: RefCell::new(None),
            state: Cell::new(ComputedState::Dirty),
            evaluations: Cell::new(0),
            registration: RefCell::new(None),
        });

        let handle = Runtime::register(inner.clone());
        *inner.registration.borrow_mut() = Some(handle);

        Self { inner }
    }

    /// Get the subscriber ID for this computed.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> Value {
        Runtime::track(self.inner.source);

        if self.inner.state.get() == ComputedState::Clean {
            if let Some(value) = self.inner.value.borrow().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    /// Write through the setter.
    pub fn set(&self, value: Value) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => Err(StoreError::ReadOnlyComputed),
        }
    }

    fn recompute(&self) -> Value {
        let value = {
            let _ctx = ReactiveContext::enter(self.inner.subscriber_id);
            let value = (self.inner.getter)();
            Runtime::set_dependencies(self.inner.subscriber_id, ReactiveContext::get_dependencies());
            value
        };

        self.inner
            .evaluations
            .set(self.inner.evaluations.get() + 1);
        *self.inner.value.borrow_mut() = Some(value.clone());
        self.inner.state.set(ComputedState::Clean);

        value
    }

    /// Force the next read to re-run the getter.
    pub fn mark_dirty(&self) {
        self.inner.mark_maybe_dirty();
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        self.inner.state.get()
    }

    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Number of times the getter ran.
    pub fn evaluations(&self) -> usize {
        self.inner.evaluations.get()
    }

    pub fn ptr_eq(&self, other: &Computed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("writable", &self.is_writable())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    #[test]
    fn computed_computes_on_first_access() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();

        let computed = Computed::new(move || {
            calls_clone.set(calls_clone.get() + 1);
            Value::from(42)
        });

        assert!(!computed.has_value());
        assert_eq!(calls.get(), 0);

        assert_eq!(computed.get(), Value::from(42));
        assert_eq!(calls.get(), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let computed = Computed::new(|| Value::from(42));

        computed.get();
        computed.get();
        computed.get();

        assert_eq!(computed.evaluations(), 1);
    }

    #[test]
    fn computed_recomputes_after_dependency_change() {
        let state = Object::reactive_from([("count", Value::from(1))]);
        let state_clone = state.clone();
        let computed = Computed::new(move || {
            let count = state_clone.get("count").as_f64().unwrap_or_default();
            Value::from(count * 2.0)
        });

        assert_eq!(computed.get(), Value::from(2));
        assert_eq!(computed.state(), ComputedState::Clean);

        state.set("count", 5).unwrap();
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(computed.evaluations(), 1, "re-derivation is lazy");

        assert_eq!(computed.get(), Value::from(10));
        assert_eq!(computed.evaluations(), 2);
    }

    #[test]
    fn unrelated_writes_keep_the_cache() {
        let state = Object::reactive_from([("a", Value::from(1)), ("b", Value::from(2))]);
        let state_clone = state.clone();
        let computed = Computed::new(move || state_clone.get("a"));

        computed.get();
        state.set("b", 3).unwrap();
        computed.get();

        assert_eq!(computed.evaluations(), 1);
    }

    #[test]
    fn computed_depends_on_computed() {
        let state = Object::reactive_from([("base", Value::from(5))]);
        let state_clone = state.clone();
        let doubled = Computed::new(move || {
            Value::from(state_clone.get("base").as_f64().unwrap_or_default() * 2.0)
        });
        let doubled_clone = doubled.clone();
        let plus_ten = Computed::new(move || {
            Value::from(doubled_clone.get().as_f64().unwrap_or_default() + 10.0)
        });

        assert_eq!(plus_ten.get(), Value::from(20));

        state.set("base", 10).unwrap();
        assert_eq!(plus_ten.state(), ComputedState::Dirty);
        assert_eq!(plus_ten.get(), Value::from(30));
    }

    #[test]
    fn writable_computed_delegates_to_setter() {
        let state = Object::reactive_from([("value", Value::from(1))]);
        let (read, write) = (state.clone(), state.clone());
        let computed = Computed::with_setter(
            move || read.get("value"),
            move |value| write.set("value", value),
        );

        assert!(computed.is_writable());
        computed.set(Value::from(7)).unwrap();
        assert_eq!(computed.get(), Value::from(7));
    }

    #[test]
    fn read_only_computed_rejects_writes() {
        let computed = Computed::new(|| Value::Null);
        assert_eq!(computed.set(Value::from(1)), Err(StoreError::ReadOnlyComputed));
    }

    #[test]
    fn computed_state_transitions() {
        let computed = Computed::new(|| Value::from(42));

        assert_eq!(computed.state(), ComputedState::Dirty);

        computed.get();
        assert_eq!(computed.state(), ComputedState::Clean);

        computed.mark_dirty();
        assert_eq!(computed.state(), ComputedState::Dirty);

        computed.get();
        assert_eq!(computed.state(), ComputedState::Clean);
        assert_eq!(computed.evaluations(), 2);
    }
}
