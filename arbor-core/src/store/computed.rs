//! Computed Binder
//!
//! Replaces every getter declaration with an own accessor backed by a
//! [`Computed`]. Reads go through the cache, so the original getter only runs
//! again after something it read has changed. A getter with a setter becomes
//! a writable computed; a getter alone stays read-only.
//!
//! The installed accessor keeps the declaration's enumerability and is always
//! configurable. Freezing the instance afterwards doesn't break reads.
//!
//! The computed holds the instance weakly. Computed bindings therefore need no
//! teardown: they go away with the instance.

use std::rc::Rc;

use super::descriptor::Declarations;
use crate::error::Result;
use crate::reactive::Computed;
use crate::value::{Getter, Object, Property, Setter, Slot, Value};

/// Install cached accessors on `instance` for every computed declaration.
///
/// Returns the number of accessors installed.
pub fn bind_computed(instance: &Object, declarations: &Declarations) -> Result<usize> {
    let mut bound = 0;
    for decl in declarations.computed() {
        let Some(getter) = decl.slot.getter().cloned() else {
            continue;
        };
        let computed = computed_for(instance, getter, decl.slot.setter().cloned());

        let read = computed.clone();
        let get: Getter = Rc::new(move |_| read.get());
        let set: Option<Setter> = computed.is_writable().then(|| {
            let write = computed.clone();
            Rc::new(move |_: &Object, value: Value| write.set(value)) as Setter
        });

        instance.define_property(
            &decl.key,
            Property {
                slot: Slot::Accessor {
                    get: Some(get),
                    set,
                },
                enumerable: decl.enumerable,
                configurable: true,
            },
        )?;
        bound += 1;
    }

    if bound > 0 {
        tracing::debug!(computed = bound, "bound computed properties");
    }
    Ok(bound)
}

fn computed_for(instance: &Object, getter: Getter, setter: Option<Setter>) -> Computed {
    let weak = instance.downgrade();
    let get = move || {
        weak.upgrade()
            .map_or(Value::Undefined, |this| getter(&this))
    };

    match setter {
        Some(setter) => {
            let weak = instance.downgrade();
            Computed::with_setter(get, move |value| match weak.upgrade() {
                Some(this) => setter(&this, value),
                None => Ok(()),
            })
        }
        None => Computed::new(get),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::descriptor::resolve_object;
    use std::cell::Cell;

    fn model_with_getter(calls: Rc<Cell<usize>>) -> Object {
        let model = Object::reactive_from([("value", 10)]);
        let getter: Getter = Rc::new(move |this| {
            calls.set(calls.get() + 1);
            Value::from(this.get("value").as_f64().unwrap_or_default() + 1.0)
        });
        model
            .define_property("next", Property::accessor(Some(getter), None))
            .unwrap();
        model
    }

    #[test]
    fn getter_runs_once_per_change() {
        let calls = Rc::new(Cell::new(0));
        let model = model_with_getter(calls.clone());
        bind_computed(&model, &resolve_object(&model)).unwrap();

        assert_eq!(calls.get(), 0, "computed values are lazy");
        assert_eq!(model.get("next"), Value::from(11));
        assert_eq!(model.get("next"), Value::from(11));
        assert_eq!(calls.get(), 1);

        model.set("value", 20).unwrap();
        assert_eq!(model.get("next"), Value::from(21));
        assert_eq!(model.get("next"), Value::from(21));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn read_only_computed_rejects_assignment() {
        let model = model_with_getter(Rc::new(Cell::new(0)));
        bind_computed(&model, &resolve_object(&model)).unwrap();

        assert!(matches!(
            model.set("next", 1),
            Err(StoreError::ReadOnly { .. })
        ));
    }

    #[test]
    fn writable_computed_forwards_to_setter() {
        let model = Object::reactive_from([("celsius", 0)]);
        let getter: Getter = Rc::new(|this| {
            let c = this.get("celsius").as_f64().unwrap_or_default();
            Value::from(c * 9.0 / 5.0 + 32.0)
        });
        let setter: Setter = Rc::new(|this, value| {
            let f = value.as_f64().unwrap_or_default();
            this.set("celsius", (f - 32.0) * 5.0 / 9.0)
        });
        model
            .define_property("fahrenheit", Property::accessor(Some(getter), Some(setter)))
            .unwrap();
        bind_computed(&model, &resolve_object(&model)).unwrap();

        assert_eq!(model.get("fahrenheit"), Value::from(32));
        model.set("fahrenheit", 212).unwrap();
        assert_eq!(model.get("celsius"), Value::from(100));
        assert_eq!(model.get("fahrenheit"), Value::from(212));
    }

    #[test]
    fn replacement_keeps_enumerability_and_is_configurable() {
        let model = Object::reactive_from([("value", 1)]);
        let getter: Getter = Rc::new(|this| this.get("value"));
        model
            .define_property("hidden", Property::accessor(Some(getter), None).enumerable(false))
            .unwrap();

        bind_computed(&model, &resolve_object(&model)).unwrap();

        let property = model.own_property("hidden").unwrap();
        assert!(!property.enumerable);
        assert!(property.configurable);
        assert_eq!(model.keys(), vec!["value"]);
    }

    #[test]
    fn reads_survive_freezing() {
        let model = model_with_getter(Rc::new(Cell::new(0)));
        bind_computed(&model, &resolve_object(&model)).unwrap();
        model.freeze();
        assert_eq!(model.get("next"), Value::from(11));
    }
}
