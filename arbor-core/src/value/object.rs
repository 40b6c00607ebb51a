//! Objects
//!
//! An [`Object`] is a shared, insertion-ordered table of properties. Each
//! property holds either data or a getter/setter pair, plus enumerable and
//! configurable flags.
//!
//! # Class Members
//!
//! Objects constructed from a [`Class`] fall back to the class's resolved
//! members for keys they don't own, the way instances see their prototype
//! chain. Methods and accessors normally live there; binding a computed
//! property installs an own accessor that shadows the class member.
//!
//! # Reactivity
//!
//! A reactive object keeps one source per property key plus one for its key
//! set. Reads inside a tracking context record the key's source; writes that
//! change a value (SameValue) trigger it, and adding or removing a key also
//! triggers the key set. Objects and arrays read through a reactive object
//! become reactive themselves.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::{Getter, Setter, Value};
use crate::error::{Result, StoreError};
use crate::reactive::{untracked, EffectScope, Runtime, SourceId};
use crate::store::Class;

/// What a property holds.
#[derive(Clone)]
pub enum Slot {
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

impl Slot {
    pub fn is_accessor(&self) -> bool {
        matches!(self, Slot::Accessor { .. })
    }

    pub fn getter(&self) -> Option<&Getter> {
        match self {
            Slot::Accessor { get, .. } => get.as_ref(),
            Slot::Data(_) => None,
        }
    }

    pub fn setter(&self) -> Option<&Setter> {
        match self {
            Slot::Accessor { set, .. } => set.as_ref(),
            Slot::Data(_) => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Slot::Data(value) => Some(value),
            Slot::Accessor { .. } => None,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Slot::Accessor { get, set } => f
                .debug_struct("Accessor")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .finish(),
        }
    }
}

/// A property descriptor.
#[derive(Clone, Debug)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// An enumerable, configurable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data(value.into()),
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor property.
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            slot: Slot::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }
}

struct ObjectInner {
    props: RefCell<IndexMap<String, Property>>,
    class: Option<Class>,
    reactive: Cell<bool>,
    frozen: Cell<bool>,

    /// Per-key sources, created on first tracked read.
    sources: RefCell<HashMap<String, SourceId>>,
    /// Source for the set of keys.
    keys_source: SourceId,

    /// Scope owning the watches bound to this object as a store.
    scope: RefCell<Option<EffectScope>>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        for source in self.sources.get_mut().values() {
            Runtime::forget_source(*source);
        }
        Runtime::forget_source(self.keys_source);
    }
}

/// A shared property table.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    pub fn new() -> Self {
        Self::build(IndexMap::new(), None)
    }

    /// A fresh instance of `class`, with no own properties yet.
    pub(crate) fn with_class(class: &Class) -> Self {
        Self::build(IndexMap::new(), Some(class.clone()))
    }

    fn build(props: IndexMap<String, Property>, class: Option<Class>) -> Self {
        Self(Rc::new(ObjectInner {
            props: RefCell::new(props),
            class,
            reactive: Cell::new(false),
            frozen: Cell::new(false),
            sources: RefCell::new(HashMap::new()),
            keys_source: SourceId::new(),
            scope: RefCell::new(None),
        }))
    }

    /// Plain data object from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let props = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), Property::data(value)))
            .collect();
        Self::build(props, None)
    }

    /// Reactive data object from key/value pairs.
    pub fn reactive_from<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::from_pairs(pairs).make_reactive()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Read a property, running getters with this object as receiver.
    /// Missing keys read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        self.track(key);
        match self.lookup(key) {
            Some(Slot::Data(value)) => self.wrap(value),
            Some(Slot::Accessor { get: Some(getter), .. }) => getter(self),
            Some(Slot::Accessor { get: None, .. }) | None => Value::Undefined,
        }
    }

    /// Read a property without recording dependencies.
    pub fn get_untracked(&self, key: &str) -> Value {
        untracked(|| self.get(key))
    }

    /// Whether the object or its class has `key`.
    pub fn has(&self, key: &str) -> bool {
        self.track(key);
        self.lookup(key).is_some()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    /// Own enumerable keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.track_keys();
        self.0
            .props
            .borrow()
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Own property descriptor.
    pub fn own_property(&self, key: &str) -> Option<Property> {
        self.0.props.borrow().get(key).cloned()
    }

    /// Every own property, enumerable or not, in insertion order.
    pub fn own_properties(&self) -> Vec<(String, Property)> {
        self.0
            .props
            .borrow()
            .iter()
            .map(|(key, prop)| (key.clone(), prop.clone()))
            .collect()
    }

    /// Enumerable own keys and their values, without tracking.
    pub(crate) fn snapshot(&self) -> Vec<(String, Value)> {
        untracked(|| {
            self.keys()
                .into_iter()
                .map(|key| {
                    let value = self.get(&key);
                    (key, value)
                })
                .collect()
        })
    }

    fn lookup(&self, key: &str) -> Option<Slot> {
        if let Some(prop) = self.0.props.borrow().get(key) {
            return Some(prop.slot.clone());
        }
        self.class_member(key)
    }

    fn class_member(&self, key: &str) -> Option<Slot> {
        let class = self.0.class.as_ref()?;
        class.declarations().get(key).map(|decl| decl.slot.clone())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Assign a property.
    ///
    /// Accessors (own or inherited from the class) route through their
    /// setter; without one the write fails. Anything else becomes an own data
    /// property.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let own = self.0.props.borrow().get(key).map(|prop| prop.slot.clone());
        let slot = match own {
            Some(slot) => Some(slot),
            None => self.class_member(key).filter(Slot::is_accessor),
        };

        match slot {
            Some(Slot::Accessor { set: Some(setter), .. }) => setter(self, value),
            Some(Slot::Accessor { set: None, .. }) => Err(StoreError::ReadOnly {
                key: key.to_string(),
            }),
            _ => self.write_data(key, value),
        }
    }

    fn write_data(&self, key: &str, value: Value) -> Result<()> {
        if self.is_frozen() {
            return Err(StoreError::Frozen {
                key: key.to_string(),
            });
        }

        let (changed, added) = {
            let mut props = self.0.props.borrow_mut();
            match props.get_mut(key) {
                Some(prop) => match &mut prop.slot {
                    Slot::Data(old) => {
                        let changed = !old.same_value(&value);
                        *old = value;
                        (changed, false)
                    }
                    slot => {
                        *slot = Slot::Data(value);
                        (true, false)
                    }
                },
                None => {
                    props.insert(key.to_string(), Property::data(value));
                    (true, true)
                }
            }
        };

        if changed {
            self.trigger(key);
        }
        if added {
            self.trigger_keys();
        }
        Ok(())
    }

    /// Delete an own property. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        if self.is_frozen() {
            return Err(StoreError::Frozen {
                key: key.to_string(),
            });
        }
        let removed = {
            let mut props = self.0.props.borrow_mut();
            match props.get(key).map(|prop| prop.configurable) {
                Some(false) => {
                    return Err(StoreError::NotConfigurable {
                        key: key.to_string(),
                    })
                }
                Some(true) => props.shift_remove(key),
                None => None,
            }
        };

        if removed.is_none() {
            return Ok(false);
        }
        self.trigger(key);
        self.trigger_keys();
        Ok(true)
    }

    /// Install an own property descriptor, replacing any configurable one.
    ///
    /// Defining does not notify dependents.
    pub fn define_property(&self, key: &str, property: Property) -> Result<()> {
        if self.is_frozen() {
            return Err(StoreError::Frozen {
                key: key.to_string(),
            });
        }
        let mut props = self.0.props.borrow_mut();
        if matches!(props.get(key), Some(existing) if !existing.configurable) {
            return Err(StoreError::NotConfigurable {
                key: key.to_string(),
            });
        }
        props.insert(key.to_string(), property);
        Ok(())
    }

    /// Call the function stored under `name` with this object as receiver.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name) {
            Value::Function(function) => function.call(self, args),
            _ => Err(StoreError::NotCallable {
                key: name.to_string(),
            }),
        }
    }

    /// Reject further writes, deletes and definitions. Accessor setters still run.
    pub fn freeze(&self) {
        self.0.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    // ------------------------------------------------------------------------
    // Reactivity
    // ------------------------------------------------------------------------

    /// Mark this object reactive and return the same handle.
    pub fn make_reactive(&self) -> Self {
        self.0.reactive.set(true);
        self.clone()
    }

    pub fn is_reactive(&self) -> bool {
        self.0.reactive.get()
    }

    fn track(&self, key: &str) {
        if !self.is_reactive() || !Runtime::is_tracking() {
            return;
        }
        let existing = self.0.sources.borrow().get(key).copied();
        let source = existing.unwrap_or_else(|| {
            let source = SourceId::new();
            self.0.sources.borrow_mut().insert(key.to_string(), source);
            source
        });
        Runtime::track(source);
    }

    fn track_keys(&self) {
        if self.is_reactive() && Runtime::is_tracking() {
            Runtime::track(self.0.keys_source);
        }
    }

    fn trigger(&self, key: &str) {
        if !self.is_reactive() {
            return;
        }
        let source = self.0.sources.borrow().get(key).copied();
        if let Some(source) = source {
            Runtime::trigger(source);
        }
    }

    fn trigger_keys(&self) {
        if self.is_reactive() {
            Runtime::trigger(self.0.keys_source);
        }
    }

    fn wrap(&self, value: Value) -> Value {
        if self.is_reactive() {
            value.into_reactive()
        } else {
            value
        }
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    /// The class this object was constructed from.
    pub fn class(&self) -> Option<Class> {
        self.0.class.clone()
    }

    /// Whether this object was constructed from `class` or a subclass of it.
    pub fn instance_of(&self, class: &Class) -> bool {
        self.0
            .class
            .as_ref()
            .is_some_and(|own| own.is_subclass_of(class))
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    /// Copy own properties, deep-cloning data. The copy keeps the class but
    /// is neither reactive nor frozen.
    pub fn deep_clone(&self) -> Self {
        let props = self
            .0
            .props
            .borrow()
            .iter()
            .map(|(key, prop)| {
                let slot = match &prop.slot {
                    Slot::Data(value) => Slot::Data(value.deep_clone()),
                    accessor => accessor.clone(),
                };
                (
                    key.clone(),
                    Property {
                        slot,
                        ..prop.clone()
                    },
                )
            })
            .collect();
        Self::build(props, self.0.class.clone())
    }

    pub(crate) fn scope(&self) -> Option<EffectScope> {
        self.0.scope.borrow().clone()
    }

    pub(crate) fn set_scope(&self, scope: EffectScope) {
        *self.0.scope.borrow_mut() = Some(scope);
    }

    pub(crate) fn take_scope(&self) -> Option<EffectScope> {
        self.0.scope.borrow_mut().take()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Object");
        if let Some(class) = &self.0.class {
            debug.field("class", &class.name());
        }
        match self.0.props.try_borrow() {
            Ok(props) => debug.field("keys", &props.keys().collect::<Vec<_>>()),
            Err(_) => debug.field("keys", &"<borrowed>"),
        };
        debug.field("reactive", &self.is_reactive()).finish()
    }
}

/// A non-owning reference to an [`Object`].
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }

    /// Whether the object is still alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{tick, watch, Computed, WatchHandle, WatchOptions};
    use crate::value::Function;

    fn counting_watch(source: impl Fn() -> Value + 'static) -> (Rc<Cell<usize>>, WatchHandle) {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let handle = watch(
            source,
            move |_, _| counter.set(counter.get() + 1),
            WatchOptions::new(),
        );
        (fired, handle)
    }

    #[test]
    fn missing_keys_read_undefined() {
        let object = Object::new();
        assert_eq!(object.get("nothing"), Value::Undefined);
        assert!(!object.has("nothing"));
    }

    #[test]
    fn keys_keep_insertion_order_and_skip_hidden() {
        let object = Object::from_pairs([("b", 1), ("a", 2)]);
        object
            .define_property("hidden", Property::data(3).enumerable(false))
            .unwrap();
        object.set("c", 4).unwrap();

        assert_eq!(object.keys(), vec!["b", "a", "c"]);
        assert!(object.has_own("hidden"));
    }

    #[test]
    fn accessor_without_setter_is_read_only() {
        let object = Object::new();
        let getter: Getter = Rc::new(|_| Value::from(1));
        object
            .define_property("one", Property::accessor(Some(getter), None))
            .unwrap();

        assert_eq!(object.get("one"), Value::from(1));
        assert_eq!(
            object.set("one", 2),
            Err(StoreError::ReadOnly {
                key: "one".to_string()
            })
        );
    }

    #[test]
    fn accessor_setter_receives_this() {
        let object = Object::from_pairs([("raw", 0)]);
        let setter: Setter = Rc::new(|this, value| this.set("raw", value));
        object
            .define_property("proxy", Property::accessor(None, Some(setter)))
            .unwrap();

        object.set("proxy", 5).unwrap();
        assert_eq!(object.get("raw"), Value::from(5));
        assert_eq!(object.get("proxy"), Value::Undefined);
    }

    #[test]
    fn frozen_objects_reject_writes() {
        let object = Object::from_pairs([("a", 1)]);
        object.freeze();

        assert!(matches!(object.set("a", 2), Err(StoreError::Frozen { .. })));
        assert!(matches!(object.remove("a"), Err(StoreError::Frozen { .. })));
        assert!(matches!(
            object.define_property("b", Property::data(1)),
            Err(StoreError::Frozen { .. })
        ));
        assert_eq!(object.get("a"), Value::from(1));
    }

    #[test]
    fn non_configurable_properties_cannot_be_redefined() {
        let object = Object::new();
        object
            .define_property("fixed", Property::data(1).configurable(false))
            .unwrap();

        assert!(matches!(
            object.define_property("fixed", Property::data(2)),
            Err(StoreError::NotConfigurable { .. })
        ));
        assert!(matches!(
            object.remove("fixed"),
            Err(StoreError::NotConfigurable { .. })
        ));
        object.set("fixed", 3).unwrap();
        assert_eq!(object.get("fixed"), Value::from(3));
    }

    #[test]
    fn call_uses_the_object_as_receiver() {
        let object = Object::from_pairs([("count", Value::from(1))]);
        object
            .set(
                "increment",
                Function::new(|this, _| {
                    let count = this.get("count").as_f64().unwrap_or_default();
                    this.set("count", count + 1.0)?;
                    Ok(Value::Undefined)
                }),
            )
            .unwrap();

        object.call("increment", &[]).unwrap();
        assert_eq!(object.get("count"), Value::from(2));
        assert!(matches!(
            object.call("count", &[]),
            Err(StoreError::NotCallable { .. })
        ));
    }

    #[test]
    fn reactive_writes_notify_only_on_change() {
        let state = Object::reactive_from([("value", 1)]);
        let source = state.clone();
        let (fired, _handle) = counting_watch(move || source.get("value"));

        state.set("value", 1).unwrap();
        tick();
        assert_eq!(fired.get(), 0);

        state.set("value", 2).unwrap();
        tick();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn adding_a_key_notifies_key_readers() {
        let state = Object::reactive_from([("a", 1)]);
        let source = state.clone();
        let computed = Computed::new(move || Value::from(source.keys().len()));
        assert_eq!(computed.get(), Value::from(1));

        state.set("b", 2).unwrap();
        assert_eq!(computed.get(), Value::from(2));

        state.remove("a").unwrap();
        assert_eq!(computed.get(), Value::from(1));
    }

    #[test]
    fn nested_objects_become_reactive_on_read() {
        let inner = Object::from_pairs([("value", 1)]);
        let state = Object::reactive_from([("inner", inner.clone())]);
        assert!(!inner.is_reactive());

        let read = state.get("inner").as_object().unwrap();
        assert!(read.ptr_eq(&inner));
        assert!(inner.is_reactive());
    }

    #[test]
    fn plain_objects_do_not_track() {
        let plain = Object::from_pairs([("value", 1)]);
        let source = plain.clone();
        let (fired, _handle) = counting_watch(move || source.get("value"));

        plain.set("value", 2).unwrap();
        tick();
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn weak_reference_tracks_lifetime() {
        let object = Object::new();
        let weak = object.downgrade();
        assert!(weak.upgrade().is_some());

        drop(object);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn deep_clone_is_independent() {
        let original = Object::from_pairs([("list", Value::from(vec![Value::from(1)]))]);
        let copy = original.deep_clone();

        copy.get("list").as_array().unwrap().push(2);
        assert_eq!(original.get("list").as_array().unwrap().len(), 1);
    }
}
