//! Classes and Store Composition
//!
//! A [`Class`] describes how instances are built: fields, a constructor and
//! the members instances fall back to (methods, accessors, watch keys). Classes
//! form single-inheritance chains via [`ClassBuilder::extends`].
//!
//! # Decoration
//!
//! [`decorate`] wraps a class into a store class: a subclass with the same name
//! whose instances are reactive and get their computed properties and watches
//! bound. The original's members are resolved once, when decorating, and kept
//! in the wrapper's [`StoreMetadata`]. Decorating a store class again returns
//! it unchanged.
//!
//! # Who Binds
//!
//! Every decorated level of a chain makes the instance reactive, but only the
//! class that is actually constructed binds computed properties and watches,
//! after every level's fields and constructor have run. Since that class sees
//! the whole chain's members, binding happens exactly once per instance. The
//! choice is made when a class is composed ([`Binding`]), not at construction.
//!
//! A class that derives from [`store_base`] or from a decorated class must be
//! decorated itself; constructing it undecorated fails with
//! [`StoreError::Undecorated`].
//!
//! # Reactive Base
//!
//! Classes deriving from [`reactive_base`] get reactive instances with cached
//! computed properties but no watches, and don't need decorating.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use super::computed::bind_computed;
use super::descriptor::{resolve_class, Declarations};
use super::watches::bind_watches;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::value::{Function, Getter, Object, Property, Setter, Slot, Value};

type FieldFactory = Rc<dyn Fn(&Object) -> Value>;
type Constructor = Rc<dyn Fn(&Object, &[Value]) -> Result<()>>;

/// What role a class plays in store composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// A user class.
    Plain,
    /// The store base returned by [`store_base`].
    StoreBase,
    /// The base returned by [`reactive_base`].
    ReactiveBase,
    /// A wrapper produced by [`decorate`].
    Store,
}

/// What a class binds on the instances it constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    None,
    ComputedOnly,
    Full,
}

/// Marker carried by decorated classes.
#[derive(Debug, Clone)]
pub struct StoreMetadata {
    declarations: Rc<Declarations>,
    config: Arc<StoreConfig>,
}

impl StoreMetadata {
    /// Members of the decorated class, resolved when it was decorated.
    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn config(&self) -> &Arc<StoreConfig> {
        &self.config
    }
}

enum FieldInit {
    /// Deep-cloned for every instance.
    Template(Value),
    Factory(FieldFactory),
}

struct ClassInner {
    id: u64,
    name: String,
    kind: ClassKind,
    parent: Option<Class>,

    members: IndexMap<String, Slot>,
    fields: Vec<(String, FieldInit)>,
    constructor: Option<Constructor>,
    statics: RefCell<IndexMap<String, Value>>,

    declarations: OnceCell<Rc<Declarations>>,
    binding: Binding,
    requires_decoration: bool,
    metadata: Option<StoreMetadata>,
}

/// A shared class handle. Equality is identity.
#[derive(Clone)]
pub struct Class(Rc<ClassInner>);

fn next_class_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

thread_local! {
    static STORE_BASE: Class = Class::base("StoreBase", ClassKind::StoreBase);
    static REACTIVE_BASE: Class = Class::base("ReactiveBase", ClassKind::ReactiveBase);
}

impl Class {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    fn base(name: &str, kind: ClassKind) -> Self {
        Self(Rc::new(ClassInner {
            id: next_class_id(),
            name: name.to_string(),
            kind,
            parent: None,
            members: IndexMap::new(),
            fields: Vec::new(),
            constructor: None,
            statics: RefCell::new(IndexMap::new()),
            declarations: OnceCell::new(),
            binding: match kind {
                ClassKind::ReactiveBase => Binding::ComputedOnly,
                _ => Binding::None,
            },
            requires_decoration: kind == ClassKind::StoreBase,
            metadata: None,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> ClassKind {
        self.0.kind
    }

    pub fn parent(&self) -> Option<Class> {
        self.0.parent.clone()
    }

    pub fn binding(&self) -> Binding {
        self.0.binding
    }

    /// Whether this class itself was produced by [`decorate`].
    pub fn is_decorated(&self) -> bool {
        self.0.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<&StoreMetadata> {
        self.0.metadata.as_ref()
    }

    /// Members declared on this class, without ancestors.
    pub fn own_members(&self) -> impl Iterator<Item = (&String, &Slot)> {
        self.0.members.iter()
    }

    /// Members of this class and its ancestors, resolved once and cached.
    pub fn declarations(&self) -> Rc<Declarations> {
        self.0
            .declarations
            .get_or_init(|| Rc::new(resolve_class(self)))
            .clone()
    }

    /// The chain from the root class down to this one.
    pub fn lineage(&self) -> Vec<Class> {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(class) = current {
            current = class.parent();
            chain.push(class);
        }
        chain.reverse();
        chain
    }

    /// Whether `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self.clone());
        while let Some(class) = current {
            if class.ptr_eq(other) {
                return true;
            }
            current = class.parent();
        }
        false
    }

    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------------
    // Statics
    // ------------------------------------------------------------------------

    /// Read a static, looking through ancestors.
    pub fn get_static(&self, name: &str) -> Value {
        let mut current = Some(self.clone());
        while let Some(class) = current {
            if let Some(value) = class.0.statics.borrow().get(name) {
                return value.clone();
            }
            current = class.parent();
        }
        Value::Undefined
    }

    /// Write a static on this class. Ancestors keep their own value.
    pub fn set_static(&self, name: &str, value: impl Into<Value>) {
        self.0
            .statics
            .borrow_mut()
            .insert(name.to_string(), value.into());
    }

    pub fn has_static(&self, name: &str) -> bool {
        self.lineage()
            .iter()
            .any(|class| class.0.statics.borrow().contains_key(name))
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Construct an instance.
    ///
    /// Runs every level's fields and constructor from the root down, then
    /// binds what this class is composed to bind.
    pub fn construct(&self, args: &[Value]) -> Result<Object> {
        if self.0.requires_decoration && !self.is_decorated() {
            return Err(StoreError::Undecorated {
                class: self.name().to_string(),
            });
        }

        let instance = Object::with_class(self);
        for level in self.lineage() {
            level.initialize(&instance, args)?;
        }

        match (self.0.binding, &self.0.metadata) {
            (Binding::Full, Some(metadata)) => {
                bind_computed(&instance, &metadata.declarations)?;
                bind_watches(&instance, &metadata.declarations, &metadata.config);
            }
            (Binding::Full, None) | (Binding::ComputedOnly, _) => {
                bind_computed(&instance, &self.declarations())?;
            }
            (Binding::None, _) => {}
        }
        Ok(instance)
    }

    fn initialize(&self, instance: &Object, args: &[Value]) -> Result<()> {
        if self.0.kind != ClassKind::Plain {
            instance.make_reactive();
        }
        for (name, init) in &self.0.fields {
            let value = match init {
                FieldInit::Template(value) => value.deep_clone(),
                FieldInit::Factory(factory) => factory(instance),
            };
            instance.define_property(name, Property::data(value))?;
        }
        if let Some(constructor) = &self.0.constructor {
            constructor(instance, args)?;
        }
        Ok(())
    }

    /// Whether subclasses must be decorated to be constructed.
    fn demands_decoration(&self) -> bool {
        self.0.kind == ClassKind::StoreBase || self.is_decorated() || self.0.requires_decoration
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("parent", &self.0.parent.as_ref().map(Class::name))
            .field("binding", &self.0.binding)
            .finish()
    }
}

/// Builder for [`Class`].
///
/// # Example
///
/// ```rust,ignore
/// let counter = Class::builder("Counter")
///     .extends(&store_base())
///     .field("count", 0)
///     .getter("double", |this| Value::from(this.get("count").as_f64().unwrap_or(0.0) * 2.0))
///     .member("on:count", "logCount")
///     .method("logCount", |_, args| { println!("{args:?}"); Ok(Value::Undefined) })
///     .build();
/// let counter = decorate(&counter);
/// ```
pub struct ClassBuilder {
    name: String,
    parent: Option<Class>,
    members: IndexMap<String, Slot>,
    fields: Vec<(String, FieldInit)>,
    constructor: Option<Constructor>,
    statics: IndexMap<String, Value>,
}

impl ClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            members: IndexMap::new(),
            fields: Vec::new(),
            constructor: None,
            statics: IndexMap::new(),
        }
    }

    pub fn extends(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// An instance field initialised from a template value.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .push((name.into(), FieldInit::Template(value.into())));
        self
    }

    /// An instance field initialised by a factory receiving the instance.
    pub fn field_with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Object) -> Value + 'static,
    {
        self.fields
            .push((name.into(), FieldInit::Factory(Rc::new(factory))));
        self
    }

    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> Result<Value> + 'static,
    {
        self.member(name, Function::new(f))
    }

    pub fn getter<F>(mut self, name: impl Into<String>, get: F) -> Self
    where
        F: Fn(&Object) -> Value + 'static,
    {
        let get: Getter = Rc::new(get);
        match self.members.entry(name.into()) {
            indexmap::map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Slot::Accessor { get: slot, .. } => *slot = Some(get),
                data => {
                    *data = Slot::Accessor {
                        get: Some(get),
                        set: None,
                    }
                }
            },
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(Slot::Accessor {
                    get: Some(get),
                    set: None,
                });
            }
        }
        self
    }

    pub fn setter<F>(mut self, name: impl Into<String>, set: F) -> Self
    where
        F: Fn(&Object, Value) -> Result<()> + 'static,
    {
        let set: Setter = Rc::new(set);
        match self.members.entry(name.into()) {
            indexmap::map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Slot::Accessor { set: slot, .. } => *slot = Some(set),
                data => {
                    *data = Slot::Accessor {
                        get: None,
                        set: Some(set),
                    }
                }
            },
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(Slot::Accessor {
                    get: None,
                    set: Some(set),
                });
            }
        }
        self
    }

    pub fn accessor<G, S>(self, name: impl Into<String>, get: G, set: S) -> Self
    where
        G: Fn(&Object) -> Value + 'static,
        S: Fn(&Object, Value) -> Result<()> + 'static,
    {
        let name = name.into();
        self.getter(name.clone(), get).setter(name, set)
    }

    /// A watch declared inline. `key` should follow the watch grammar
    /// (`on[.flag]*:path`); the callback receives the new and previous value.
    pub fn watch<F>(self, key: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Object, &Value, &Value) -> Result<()> + 'static,
    {
        self.method(key, move |this, args| {
            let new = args.first().cloned().unwrap_or_default();
            let old = args.get(1).cloned().unwrap_or_default();
            callback(this, &new, &old)?;
            Ok(Value::Undefined)
        })
    }

    /// A shared data member, such as a watch key naming its callback method.
    pub fn member(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(key.into(), Slot::Data(value.into()));
        self
    }

    /// Runs after this level's fields are initialised.
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> Result<()> + 'static,
    {
        self.constructor = Some(Rc::new(f));
        self
    }

    pub fn static_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.statics.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Class {
        let requires_decoration = self
            .parent
            .as_ref()
            .is_some_and(Class::demands_decoration);
        let binding = match &self.parent {
            Some(parent)
                if parent.kind() == ClassKind::ReactiveBase
                    || parent.binding() == Binding::ComputedOnly =>
            {
                Binding::ComputedOnly
            }
            _ => Binding::None,
        };

        Class(Rc::new(ClassInner {
            id: next_class_id(),
            name: self.name,
            kind: ClassKind::Plain,
            parent: self.parent,
            members: self.members,
            fields: self.fields,
            constructor: self.constructor,
            statics: RefCell::new(self.statics),
            declarations: OnceCell::new(),
            binding,
            requires_decoration,
            metadata: None,
        }))
    }
}

// ----------------------------------------------------------------------------
// Composition
// ----------------------------------------------------------------------------

/// The base class for stores. Subclasses must be decorated.
pub fn store_base() -> Class {
    STORE_BASE.with(Class::clone)
}

/// A base class whose subclasses get reactive instances and cached computed
/// properties, without watches or decoration.
pub fn reactive_base() -> Class {
    REACTIVE_BASE.with(Class::clone)
}

/// Decorate `class` using the global configuration.
pub fn decorate(class: &Class) -> Class {
    decorate_with(class, StoreConfig::global())
}

/// Decorate `class`, binding its watches with `config`.
///
/// Idempotent: a decorated class is returned as is.
pub fn decorate_with(class: &Class, config: Arc<StoreConfig>) -> Class {
    if class.is_decorated() {
        return class.clone();
    }

    let declarations = class.declarations();
    tracing::debug!(
        class = %class.name(),
        members = declarations.len(),
        watches = declarations.watches().count(),
        "decorating class as store"
    );

    Class(Rc::new(ClassInner {
        id: next_class_id(),
        name: class.name().to_string(),
        kind: ClassKind::Store,
        parent: Some(class.clone()),
        members: IndexMap::new(),
        fields: Vec::new(),
        constructor: None,
        statics: RefCell::new(IndexMap::new()),
        declarations: OnceCell::from(declarations.clone()),
        binding: Binding::Full,
        requires_decoration: false,
        metadata: Some(StoreMetadata {
            declarations,
            config,
        }),
    }))
}

/// With no argument, the store base class; with a class, its decoration.
pub fn store(class: Option<&Class>) -> Class {
    match class {
        Some(class) => decorate(class),
        None => store_base(),
    }
}
