//! Reactive Primitives
//!
//! This module implements the reactive system that stores are built on:
//! dependency tracking, computed values, watches, scopes and the flush
//! scheduler. Reactive objects themselves live in [`crate::value`]; reading a
//! property of a reactive object records it here, writing one triggers it.
//!
//! # Concepts
//!
//! ## Sources
//!
//! A source is anything that can be read and later change: one property of a
//! reactive object, the contents of a reactive array, or a computed value.
//!
//! ## Computed
//!
//! A [`Computed`] is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes, and only when read again.
//!
//! ## Watches
//!
//! A [`watch`] re-runs a source function when its dependencies change and
//! calls back with the new and previous value. Watches are batched until the
//! next [`tick`] unless they use `Flush::Sync`.
//!
//! ## Scopes
//!
//! An [`EffectScope`] owns the watches created while it runs and stops them
//! together.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically. When a source is read, we check if there is an
//! active tracking context and, if so, register the dependency.

mod computed;
mod context;
mod runtime;
mod scheduler;
mod scope;
mod subscriber;
mod watch;

pub use computed::{Computed, ComputedState};
pub use context::{untracked, ReactiveContext};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use scheduler::{tick, tick_with, Queue, Scheduler};
pub use scope::EffectScope;
pub use subscriber::{SourceId, SubscriberId};
pub use watch::{watch, Deep, Flush, WatchHandle, WatchOptions};
