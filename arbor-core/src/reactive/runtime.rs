//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive sources
//! (object properties, array contents, computed values) with the computations
//! that read them (computed values and watches).
//!
//! # How It Works
//!
//! 1. When a computed or a watch is created, it registers with the runtime.
//!
//! 2. While it runs, every source it reads is collected by the
//!    [`ReactiveContext`]. Afterwards the collected set replaces the
//!    subscriber's previous dependencies.
//!
//! 3. When a source changes, the runtime:
//!    a. Finds all dependent computations, in creation order
//!    b. Marks them as "maybe dirty"; a computed passes this on to whatever
//!       read it, which re-enters the trigger
//!    c. Collects eager ones (watches) until the outermost trigger returns,
//!       then schedules them in creation order
//!    d. Computed values are lazy - they recompute on next access
//!
//! Eager computations are only scheduled once the whole dependency graph is
//! marked. A `sync` watch reading two computed values that share a changed
//! property must never see one of them fresh and the other still cached.
//!
//! # Threading
//!
//! Stores are single-threaded. The registry lives in thread-local storage and
//! holds weak references, so registration never keeps a computation alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use super::context::ReactiveContext;
use super::subscriber::{SourceId, SubscriberId};

/// A trait for computations that can be notified when dependencies change.
pub trait Reactive {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this reactive value as potentially needing update.
    fn mark_maybe_dirty(&self);

    /// Schedule this reactive value for execution (watches only).
    fn schedule(&self);

    /// Check if this reactive value is a watch (eager) or computed (lazy).
    fn is_eager(&self) -> bool;

    /// Run a scheduled job.
    fn run(&self) {}
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

impl std::fmt::Debug for ReactiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveHandle")
            .field("subscriber_id", &self.subscriber_id)
            .finish()
    }
}

#[derive(Default)]
struct RuntimeState {
    /// Live computations. Weak so the registry never extends a lifetime.
    registry: HashMap<SubscriberId, Weak<dyn Reactive>>,
    /// Source -> computations that read it.
    subscribers: HashMap<SourceId, IndexSet<SubscriberId>>,
    /// Computation -> sources it read on its last run.
    dependencies: HashMap<SubscriberId, Vec<SourceId>>,
    /// Nesting of `trigger` calls currently marking the graph.
    batch_depth: usize,
    /// Eager computations waiting for the outermost trigger to finish.
    pending: IndexMap<SubscriberId, Rc<dyn Reactive>>,
}

impl RuntimeState {
    fn clear_dependencies(&mut self, subscriber_id: SubscriberId) {
        if let Some(sources) = self.dependencies.remove(&subscriber_id) {
            for source in sources {
                if let Some(subs) = self.subscribers.get_mut(&source) {
                    subs.shift_remove(&subscriber_id);
                    if subs.is_empty() {
                        self.subscribers.remove(&source);
                    }
                }
            }
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// The reactive runtime.
///
/// A stateless facade over the thread-local registry.
pub struct Runtime;

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped.
    pub fn register(reactive: Rc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();

        RUNTIME.with(|rt| {
            rt.borrow_mut().registry.insert(id, Rc::downgrade(&reactive));
        });

        ReactiveHandle { subscriber_id: id }
    }

    /// Unregister a reactive value and drop its dependency edges.
    fn unregister(id: SubscriberId) {
        let _ = RUNTIME.try_with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.registry.remove(&id);
            rt.clear_dependencies(id);
        });
    }

    /// Record a read of `source` by the running computation, if any.
    pub fn track(source: SourceId) {
        ReactiveContext::track_dependency(source);
    }

    /// Replace the dependencies of a subscriber after it ran.
    pub fn set_dependencies(subscriber_id: SubscriberId, sources: Vec<SourceId>) {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            let rt = &mut *rt;
            rt.clear_dependencies(subscriber_id);

            if sources.is_empty() {
                return;
            }
            for source in &sources {
                rt.subscribers
                    .entry(*source)
                    .or_default()
                    .insert(subscriber_id);
            }
            rt.dependencies.insert(subscriber_id, sources);
        });
    }

    /// Remove all dependencies for a subscriber.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let _ = RUNTIME.try_with(|rt| rt.borrow_mut().clear_dependencies(subscriber_id));
    }

    /// Drop every edge pointing at a source that no longer exists.
    pub fn forget_source(source: SourceId) {
        let _ = RUNTIME.try_with(|rt| {
            let mut rt = rt.borrow_mut();
            let rt = &mut *rt;
            if let Some(subs) = rt.subscribers.remove(&source) {
                for sub in subs {
                    if let Some(deps) = rt.dependencies.get_mut(&sub) {
                        deps.retain(|s| *s != source);
                    }
                }
            }
        });
    }

    /// Notify all subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism. Marking never runs user
    /// code; eager subscribers are scheduled after every nested trigger has
    /// returned.
    pub fn trigger(source: SourceId) {
        let reactives: Vec<Rc<dyn Reactive>> = RUNTIME.with(|rt| {
            let rt = rt.borrow();
            let Some(subs) = rt.subscribers.get(&source) else {
                return Vec::new();
            };

            let mut ids: Vec<SubscriberId> = subs.iter().copied().collect();
            ids.sort();
            ids.into_iter()
                .filter_map(|id| rt.registry.get(&id).and_then(Weak::upgrade))
                .collect()
        });

        if reactives.is_empty() {
            return;
        }

        tracing::trace!(source = source.raw(), subscribers = reactives.len(), "trigger");

        RUNTIME.with(|rt| rt.borrow_mut().batch_depth += 1);
        for reactive in &reactives {
            reactive.mark_maybe_dirty();
        }

        let jobs = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            for reactive in reactives {
                if reactive.is_eager() {
                    rt.pending.entry(reactive.subscriber_id()).or_insert(reactive);
                }
            }
            rt.batch_depth -= 1;
            if rt.batch_depth > 0 {
                return Vec::new();
            }
            let mut jobs: Vec<(SubscriberId, Rc<dyn Reactive>)> = rt.pending.drain(..).collect();
            jobs.sort_by_key(|(id, _)| *id);
            jobs
        });

        for (_, job) in jobs {
            job.schedule();
        }
    }

    /// Number of computations currently depending on `source`.
    pub fn subscriber_count(source: SourceId) -> usize {
        RUNTIME.with(|rt| rt.borrow().subscribers.get(&source).map_or(0, IndexSet::len))
    }

    /// Number of sources a computation read on its last run.
    pub fn dependency_count(subscriber_id: SubscriberId) -> usize {
        RUNTIME.with(|rt| rt.borrow().dependencies.get(&subscriber_id).map_or(0, Vec::len))
    }

    /// Whether a computation with this id is registered.
    pub fn is_registered(subscriber_id: SubscriberId) -> bool {
        RUNTIME.with(|rt| rt.borrow().registry.contains_key(&subscriber_id))
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
