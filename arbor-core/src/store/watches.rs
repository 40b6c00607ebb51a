//! Watch Binder
//!
//! Turns watch declarations into live watches on an instance.
//!
//! # How Binding Works
//!
//! 1. The callback is looked up when binding, not when the key was parsed. A
//!    string names a method on the instance, so subclasses can override it;
//!    a function is used as is. Anything else binds nothing.
//!
//! 2. The watch source re-walks the declared path from the instance on every
//!    evaluation, so replacing an intermediate object is seen.
//!
//! 3. Every watch is created inside the instance's scope, which
//!    [`destroy_store`](super::destroy_store) stops.
//!
//! # Arrays Without `.deep`
//!
//! A watch with no `.deep` flag whose value is an array also fires when the
//! array is mutated in place, not only when it is replaced. The source depends
//! on the array contents and hands the watch a fresh wrapper every time, which
//! the callback unwraps again. Each use is reported once through
//! [`StoreConfig::warn_array_compat`]. Any explicit `.deep` flag, including
//! `.deep=0`, opts out.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::reactive::{watch, WatchHandle};
use crate::value::{Function, Object, Value};

use super::descriptor::Declarations;
use super::lifecycle::scope_for;
use super::path::resolve_path;
use super::watch_key::WatchDeclaration;

/// Own key of the wrapper that carries an array through the compat shim.
const COMPAT_ARRAY_KEY: &str = "__arbor_compat_array__";

/// Create a watch on `instance` for every watch declaration whose callback
/// resolves. Returns the number of watches created.
pub fn bind_watches(
    instance: &Object,
    declarations: &Declarations,
    config: &Arc<StoreConfig>,
) -> usize {
    let class_name = instance
        .class()
        .map_or_else(|| "Object".to_string(), |class| class.name().to_string());

    let mut pending = Vec::new();
    for (decl, declaration) in declarations.watches() {
        let Some(value) = decl.slot.data() else {
            continue;
        };
        match resolve_callback(instance, value) {
            Some(callback) => pending.push((decl.key.clone(), declaration.clone(), callback)),
            None => tracing::trace!(key = %decl.key, "watch callback did not resolve, skipping"),
        }
    }

    if pending.is_empty() {
        return 0;
    }

    let scope = scope_for(instance);
    let handles: Vec<WatchHandle> = scope
        .run(|| {
            pending
                .into_iter()
                .map(|(key, declaration, callback)| {
                    bind_one(instance, key, &declaration, callback, &class_name, config)
                })
                .collect()
        })
        .unwrap_or_default();
    let created = handles.len();

    tracing::debug!(class = %class_name, watches = created, "bound watches");
    created
}

fn resolve_callback(instance: &Object, value: &Value) -> Option<Function> {
    match value {
        Value::String(name) => instance.get_untracked(name).as_function(),
        Value::Function(function) => Some(function.clone()),
        _ => None,
    }
}

fn bind_one(
    instance: &Object,
    key: String,
    declaration: &WatchDeclaration,
    callback: Function,
    class_name: &str,
    config: &Arc<StoreConfig>,
) -> WatchHandle {
    let options = declaration.options;
    let path = declaration.path.clone();
    let root = Value::Object(instance.clone());

    let this = instance.clone();
    let callback_key = key.clone();
    let invoke = move |new: &Value, old: &Value| {
        if let Err(err) = callback.call(&this, &[unwrap_compat(new), unwrap_compat(old)]) {
            tracing::warn!(key = %callback_key, error = %err, "watch callback failed");
        }
    };

    if options.deep.is_set() {
        return watch(move || resolve_path(&root, &path), invoke, options);
    }

    let config = Arc::clone(config);
    let class_name = class_name.to_string();
    let source = move || match resolve_path(&root, &path) {
        Value::Array(array) => {
            config.warn_array_compat(&class_name, &key);
            array.track_iteration();
            Value::Object(Object::from_pairs([(COMPAT_ARRAY_KEY, Value::Array(array))]))
        }
        other => other,
    };
    watch(source, invoke, options)
}

/// Unwrap the carrier object of the array compat shim.
fn unwrap_compat(value: &Value) -> Value {
    match value {
        Value::Object(object) if object.class().is_none() && object.has_own(COMPAT_ARRAY_KEY) => {
            object.get_untracked(COMPAT_ARRAY_KEY)
        }
        other => other.clone(),
    }
}
