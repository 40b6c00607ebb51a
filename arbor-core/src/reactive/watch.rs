//! Watch Implementation
//!
//! A watch re-evaluates a source function whenever something it read changes
//! and hands the new and previous value to a callback.
//!
//! # How Watches Work
//!
//! 1. When created, the source runs once to collect dependencies and to
//!    remember the initial value. With `immediate` the callback also fires
//!    right away, receiving `Undefined` as the previous value.
//!
//! 2. When a dependency changes, the watch is scheduled according to its
//!    flush mode: `sync` runs on the spot, everything else waits for the next
//!    [`tick`](super::tick).
//!
//! 3. The job re-runs the source. Shallow watches only call back when the
//!    value changed (SameValue); deep watches always call back, because a
//!    nested mutation keeps the outer identity.
//!
//! # Differences from Computed
//!
//! - Computed values are lazy; watches are eager.
//! - Computed values cache; watches remember only the previous value.
//!
//! Watches created while an [`EffectScope`](super::EffectScope) is running are
//! owned by that scope and stopped with it.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use super::context::{untracked, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::scheduler::{Queue, Scheduler};
use super::scope;
use super::subscriber::SubscriberId;
use crate::value::Value;

type WatchSource = Rc<dyn Fn() -> Value>;
type WatchCallback = Rc<dyn Fn(&Value, &Value)>;

/// How far nested structure is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deep {
    /// Not specified: compare the value itself.
    #[default]
    Unset,
    /// Compare nested structure to full depth.
    Full,
    /// Compare nested structure `n` levels down. `Depth(0)` behaves like a
    /// shallow watch but still counts as specified.
    Depth(u32),
}

impl Deep {
    pub fn is_set(&self) -> bool {
        !matches!(self, Deep::Unset)
    }

    fn depth(&self) -> Option<u32> {
        match self {
            Deep::Unset => None,
            Deep::Full => Some(u32::MAX),
            Deep::Depth(n) => Some(*n),
        }
    }

    /// Deep watches call back on every trigger.
    fn forces_trigger(&self) -> bool {
        matches!(self, Deep::Full) || matches!(self, Deep::Depth(n) if *n > 0)
    }
}

/// When a triggered watch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    /// Batched until the next tick, together with `Pre`.
    #[default]
    Default,
    /// Batched, before the update phase.
    Pre,
    /// Batched, after the update phase.
    Post,
    /// Synchronously, on the triggering write.
    Sync,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchOptions {
    pub deep: Deep,
    pub immediate: bool,
    pub once: bool,
    pub flush: Flush,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deep(mut self, deep: Deep) -> Self {
        self.deep = deep;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.flush = flush;
        self
    }
}

struct WatcherInner {
    subscriber_id: SubscriberId,
    options: WatchOptions,

    /// Cleared on stop so captured state can be released.
    source: RefCell<Option<WatchSource>>,
    callback: RefCell<Option<WatchCallback>>,

    old_value: RefCell<Value>,
    /// True until the first immediate run has called back.
    initial: Cell<bool>,
    active: Cell<bool>,
    dirty: Cell<bool>,
    fired: Cell<usize>,

    this: Weak<WatcherInner>,
    registration: RefCell<Option<ReactiveHandle>>,
}

impl WatcherInner {
    fn evaluate(&self) -> Option<Value> {
        let source = self.source.borrow().clone()?;

        let _ctx = ReactiveContext::enter(self.subscriber_id);
        let value = source();
        if let Some(depth) = self.options.deep.depth() {
            traverse(&value, depth, &mut HashSet::new());
        }
        Runtime::set_dependencies(self.subscriber_id, ReactiveContext::get_dependencies());

        Some(value)
    }

    fn run_job(&self) {
        if !self.active.get() {
            return;
        }
        self.dirty.set(false);

        let Some(new_value) = self.evaluate() else {
            return;
        };
        let old_value = self.old_value.replace(new_value.clone());

        if self.initial.replace(false)
            || self.options.deep.forces_trigger()
            || !new_value.same_value(&old_value)
        {
            self.invoke(&new_value, &old_value);
        }
    }

    fn invoke(&self, new_value: &Value, old_value: &Value) {
        let callback = self.callback.borrow().clone();
        if let Some(callback) = callback {
            self.fired.set(self.fired.get() + 1);
            untracked(|| callback(new_value, old_value));
        }
        if self.options.once {
            self.stop();
        }
    }

    fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }
        self.source.borrow_mut().take();
        self.callback.borrow_mut().take();
        self.old_value.replace(Value::Undefined);
        // Dropping the registration removes all dependency edges.
        self.registration.borrow_mut().take();
    }
}

impl Reactive for WatcherInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {
        self.dirty.set(true);
    }

    fn schedule(&self) {
        if !self.active.get() {
            return;
        }
        let queue = match self.options.flush {
            Flush::Sync => {
                self.run_job();
                return;
            }
            Flush::Default | Flush::Pre => Queue::Pre,
            Flush::Post => Queue::Post,
        };
        if let Some(this) = self.this.upgrade() {
            Scheduler::enqueue(queue, this);
        }
    }

    fn is_eager(&self) -> bool {
        true
    }

    fn run(&self) {
        self.run_job();
    }
}

/// Handle to a running watch.
///
/// The watch lives as long as a handle (or the owning scope) does; dropping
/// every handle detaches it without calling back again.
#[derive(Clone)]
pub struct WatchHandle {
    inner: Rc<WatcherInner>,
}

impl WatchHandle {
    /// Stop the watch. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Whether a dependency changed since the last run.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of times the callback ran.
    pub fn fired(&self) -> usize {
        self.inner.fired.get()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    pub fn options(&self) -> WatchOptions {
        self.inner.options
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("options", &self.inner.options)
            .field("active", &self.is_active())
            .field("fired", &self.fired())
            .finish()
    }
}

/// Watch `source` and call `callback(new, old)` when it changes.
pub fn watch<S, C>(source: S, callback: C, options: WatchOptions) -> WatchHandle
where
    S: Fn() -> Value + 'static,
    C: Fn(&Value, &Value) + 'static,
{
    let inner = Rc::new_cyclic(|this| WatcherInner {
        subscriber_id: SubscriberId::new(),
        options,
        source: RefCell::new(Some(Rc::new(source) as WatchSource)),
        callback: RefCell::new(Some(Rc::new(callback) as WatchCallback)),
        old_value: RefCell::new(Value::Undefined),
        initial: Cell::new(options.immediate),
        active: Cell::new(true),
        dirty: Cell::new(false),
        fired: Cell::new(0),
        this: this.clone(),
        registration: RefCell::new(None),
    });

    let registration = Runtime::register(inner.clone());
    *inner.registration.borrow_mut() = Some(registration);

    let handle = WatchHandle { inner };
    scope::record_watch(&handle);

    if options.immediate {
        handle.inner.run_job();
    } else if let Some(value) = handle.inner.evaluate() {
        handle.inner.old_value.replace(value);
    }

    handle
}

/// Read every nested property down to `depth` so each becomes a dependency.
fn traverse(value: &Value, depth: u32, seen: &mut HashSet<usize>) {
    if depth == 0 {
        return;
    }
    match value {
        Value::Object(object) => {
            if !seen.insert(object.addr()) {
                return;
            }
            for key in object.keys() {
                traverse(&object.get(&key), depth - 1, seen);
            }
        }
        Value::Array(array) => {
            if !seen.insert(array.addr()) {
                return;
            }
            for item in array.to_vec() {
                traverse(&item, depth - 1, seen);
            }
        }
        _ => {}
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::tick;
    use crate::value::Object;

    type Calls = Rc<RefCell<Vec<(Value, Value)>>>;

    fn recorder() -> (Calls, impl Fn(&Value, &Value) + 'static) {
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |new: &Value, old: &Value| {
            sink.borrow_mut().push((new.clone(), old.clone()))
        })
    }

    fn counter(value: i32) -> Object {
        Object::reactive_from([("value", Value::from(value))])
    }

    #[test]
    fn watch_fires_after_tick_with_new_and_old() {
        let state = counter(10);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(move || source.get("value"), callback, WatchOptions::new());

        state.set("value", 11).unwrap();
        assert!(calls.borrow().is_empty(), "batched until tick");

        tick();
        assert_eq!(*calls.borrow(), vec![(Value::from(11), Value::from(10))]);
    }

    #[test]
    fn writes_within_a_tick_are_batched() {
        let state = counter(1);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(move || source.get("value"), callback, WatchOptions::new());

        state.set("value", 2).unwrap();
        state.set("value", 3).unwrap();
        tick();

        assert_eq!(*calls.borrow(), vec![(Value::from(3), Value::from(1))]);
    }

    #[test]
    fn unchanged_values_do_not_call_back() {
        let state = counter(1);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(move || source.get("value"), callback, WatchOptions::new());

        state.set("value", 2).unwrap();
        state.set("value", 1).unwrap();
        tick();

        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn sync_watch_fires_on_write() {
        let state = counter(10);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(
            move || source.get("value"),
            callback,
            WatchOptions::new().flush(Flush::Sync),
        );

        state.set("value", 11).unwrap();
        assert_eq!(*calls.borrow(), vec![(Value::from(11), Value::from(10))]);
    }

    #[test]
    fn immediate_watch_fires_on_creation() {
        let state = counter(10);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(
            move || source.get("value"),
            callback,
            WatchOptions::new().immediate(),
        );

        assert_eq!(*calls.borrow(), vec![(Value::from(10), Value::Undefined)]);

        state.set("value", 11).unwrap();
        tick();
        assert_eq!(calls.borrow()[1], (Value::from(11), Value::from(10)));
    }

    #[test]
    fn once_watch_stops_after_first_call() {
        let state = counter(10);
        let (calls, callback) = recorder();
        let source = state.clone();
        let handle = watch(move || source.get("value"), callback, WatchOptions::new().once());

        state.set("value", 11).unwrap();
        tick();
        state.set("value", 12).unwrap();
        tick();

        assert_eq!(*calls.borrow(), vec![(Value::from(11), Value::from(10))]);
        assert!(!handle.is_active());
    }

    #[test]
    fn deep_watch_sees_nested_mutation() {
        let inner = Object::from_pairs([("value", Value::from(10))]);
        let state = Object::reactive_from([(
            "value",
            Value::from(Object::from_pairs([("deep", Value::from(inner))])),
        )]);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(
            move || source.get("value"),
            callback,
            WatchOptions::new().deep(Deep::Full),
        );

        let nested = state.get("value").as_object().unwrap().get("deep");
        nested.as_object().unwrap().set("value", 11).unwrap();
        tick();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, state.get("value"));
        assert_eq!(calls[0].1, state.get("value"));
    }

    #[test]
    fn depth_limits_traversal() {
        let nested = Object::from_pairs([("value", Value::from(10))]);
        let state = Object::reactive_from([(
            "value",
            Value::from(Object::from_pairs([
                ("shallow", Value::from(10)),
                ("deep", Value::from(nested)),
            ])),
        )]);
        let (calls, callback) = recorder();
        let source = state.clone();
        let _handle = watch(
            move || source.get("value"),
            callback,
            WatchOptions::new().deep(Deep::Depth(1)),
        );

        let value = state.get("value").as_object().unwrap();
        value.get("deep").as_object().unwrap().set("value", 11).unwrap();
        tick();
        assert!(calls.borrow().is_empty());

        value.set("shallow", 11).unwrap();
        tick();
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn stopped_watch_releases_dependencies() {
        let state = counter(1);
        let (calls, callback) = recorder();
        let source = state.clone();
        let handle = watch(move || source.get("value"), callback, WatchOptions::new());
        assert_eq!(Runtime::dependency_count(handle.subscriber_id()), 1);

        handle.stop();
        handle.stop();
        state.set("value", 2).unwrap();
        tick();

        assert!(calls.borrow().is_empty());
        assert_eq!(Runtime::dependency_count(handle.subscriber_id()), 0);
    }

    #[test]
    fn watches_fire_in_registration_order() {
        let state = counter(1);
        let order = Rc::new(RefCell::new(Vec::new()));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let source = state.clone();
                let order = order.clone();
                watch(
                    move || source.get("value"),
                    move |_, _| order.borrow_mut().push(i),
                    WatchOptions::new(),
                )
            })
            .collect();

        state.set("value", 2).unwrap();
        tick();
        state.set("value", 3).unwrap();
        tick();

        assert_eq!(*order.borrow(), vec![0, 1, 2, 0, 1, 2]);
        drop(handles);
    }

    #[test]
    fn post_watch_runs_after_update_phase() {
        let state = counter(1);
        let log = Rc::new(RefCell::new(Vec::new()));
        let (source_pre, source_post) = (state.clone(), state.clone());
        let (log_pre, log_post, log_update) = (log.clone(), log.clone(), log.clone());

        let _post = watch(
            move || source_post.get("value"),
            move |_, _| log_post.borrow_mut().push("post"),
            WatchOptions::new().flush(Flush::Post),
        );
        let _pre = watch(
            move || source_pre.get("value"),
            move |_, _| log_pre.borrow_mut().push("pre"),
            WatchOptions::new().flush(Flush::Pre),
        );

        state.set("value", 2).unwrap();
        crate::reactive::tick_with(move || log_update.borrow_mut().push("update"));

        assert_eq!(*log.borrow(), vec!["pre", "update", "post"]);
    }
}
