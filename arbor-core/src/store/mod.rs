//! Store Composition
//!
//! This module turns plain objects and classes into stores: reactive instances
//! whose getters are cached and whose watch keys are live watches.
//!
//! # Pipeline
//!
//! ```text
//!   Class / Object
//!        │
//!        ▼
//!   descriptor::resolve_*      flatten members across the chain
//!        │
//!        ▼
//!   watch_key::parse_watch_key classify keys, parse `on[.flags]:path`
//!        │
//!        ▼
//!   computed::bind_computed    getters -> cached accessors
//!   watches::bind_watches      watch keys -> watches in the instance scope
//!        │
//!        ▼
//!   lifecycle::destroy_store   stop the instance's watches
//! ```
//!
//! There are two entry points:
//!
//! - [`create_store`] binds an existing object in place. Its own properties
//!   count, so watch keys set directly on the object work.
//! - [`decorate`] (or [`store`]) composes a class so that every instance it
//!   constructs is bound. Only class members count there; instance fields named
//!   like watch keys stay plain data.

mod class;
mod computed;
mod descriptor;
mod lifecycle;
mod path;
mod watch_key;
mod watches;

use std::sync::Arc;

pub use class::{
    decorate, decorate_with, reactive_base, store, store_base, Binding, Class, ClassBuilder,
    ClassKind, StoreMetadata,
};
pub use computed::bind_computed;
pub use descriptor::{
    resolve_class, resolve_object, Declarations, Level, MemberDeclaration, MemberKind, Treatment,
};
pub use lifecycle::{destroy_store, has_scope, scope_for};
pub use path::resolve_path;
pub use watch_key::{is_watch_key, parse_watch_key, WatchDeclaration, WatchPath};
pub use watches::bind_watches;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::value::Object;

/// Make `model` a store using the global configuration.
///
/// `model` itself becomes reactive; the returned handle is the same object.
/// Binding the same object twice duplicates its watches.
pub fn create_store(model: &Object) -> Result<Object> {
    create_store_with(model, &StoreConfig::global())
}

/// Make `model` a store, binding its watches with `config`.
pub fn create_store_with(model: &Object, config: &Arc<StoreConfig>) -> Result<Object> {
    let instance = model.make_reactive();
    let declarations = resolve_object(&instance);
    bind_computed(&instance, &declarations)?;
    bind_watches(&instance, &declarations, config);
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::tick;
    use crate::value::{Function, Getter, Property, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn create_store_binds_in_place() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let model = Object::from_pairs([("count", Value::from(10))]);
        model
            .set(
                "on:count",
                Function::new(move |this, args| {
                    sink.borrow_mut().push(args.to_vec());
                    assert!(this.is_reactive());
                    Ok(Value::Undefined)
                }),
            )
            .unwrap();

        let store = create_store(&model).unwrap();
        assert!(store.ptr_eq(&model));
        assert!(has_scope(&store));

        store.set("count", 11).unwrap();
        tick();
        assert_eq!(*seen.borrow(), vec![vec![Value::from(11), Value::from(10)]]);
        destroy_store(&store);
    }

    #[test]
    fn create_store_keeps_shape() {
        let model = Object::from_pairs([("plain", 10), ("string!", 20)]);
        let getter: Getter = Rc::new(|this| this.get("plain"));
        model
            .define_property("mirror", Property::accessor(Some(getter), None))
            .unwrap();

        let store = create_store(&model).unwrap();
        assert_eq!(store.keys(), vec!["plain", "string!", "mirror"]);
        assert_eq!(store.get("mirror"), Value::from(10));
        assert!(!has_scope(&store));
    }
}
