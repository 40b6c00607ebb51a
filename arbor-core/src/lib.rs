//! Arbor Core
//!
//! This crate turns plain objects and class hierarchies into stores: reactive
//! instances whose getters become cached derived values and whose watch keys
//! become change callbacks.
//! It implements:
//!
//! - A dynamic value model (objects with data and accessor properties, arrays,
//!   functions)
//! - Reactive primitives (computed values, watches, effect scopes, a flush
//!   scheduler)
//! - The store composition engine (member resolution, the watch key grammar,
//!   computed and watch binding, class decoration, teardown)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: Values, objects, arrays and functions
//! - `reactive`: Dependency tracking, computed values, watches and scheduling
//! - `store`: Store composition on top of the two
//! - `config`: Settings shared by the binders
//! - `error`: The crate's error type
//!
//! Everything is single-threaded: values are `Rc`-based and the reactive
//! runtime lives in thread-local storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::{decorate, store_base, tick, Class, Value};
//!
//! let counter = Class::builder("Counter")
//!     .extends(&store_base())
//!     .field("count", 10)
//!     .getter("double", |this| Value::from(this.get("count").as_f64().unwrap_or(0.0) * 2.0))
//!     .watch("on:count", |_, new, old| {
//!         println!("count: {old:?} -> {new:?}");
//!         Ok(())
//!     })
//!     .build();
//!
//! let store = decorate(&counter).construct(&[])?;
//! store.set("count", 11)?;
//! tick(); // prints "count: 10 -> 11"
//! assert_eq!(store.get("double"), Value::from(22));
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod store;
pub mod value;

pub use config::{ConfigOptions, StoreConfig};
pub use error::{Result, StoreError};
pub use reactive::{tick, tick_with, untracked, Deep, EffectScope, Flush, WatchOptions};
pub use store::{
    create_store, create_store_with, decorate, decorate_with, destroy_store, reactive_base, store,
    store_base, Class, ClassBuilder,
};
pub use value::{Array, Function, Object, Property, Value};
