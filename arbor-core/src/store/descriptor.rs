//! Descriptor Resolution
//!
//! Flattens the members visible on a class (or on one object) into a single
//! ordered mapping. Walking a class chain root to leaf, each level overwrites
//! what its ancestors declared under the same key, keeping the position the
//! key first appeared at. Base classes contribute nothing.
//!
//! Each declaration gets exactly one treatment:
//!
//! - **Computed** if it has a getter,
//! - **Watch** if its key follows the watch grammar,
//! - **Data** otherwise.
//!
//! Watch keys are parsed once, when the declaration is created, so a class
//! resolves and parses its members a single time no matter how many instances
//! it constructs.

use std::rc::Rc;

use indexmap::IndexMap;

use super::class::Class;
use super::watch_key::{parse_watch_key, WatchDeclaration};
use crate::value::{Object, Slot, Value};

/// Where a member was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Level {
    /// On the class with this name.
    Class(Rc<str>),
    /// Directly on the object.
    Instance,
}

/// The shape of a declared member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Value,
    Method,
    Getter,
    Setter,
    GetterSetter,
}

/// How the binders treat a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Treatment {
    Computed,
    Watch(WatchDeclaration),
    Data,
}

/// One resolved member.
#[derive(Debug, Clone)]
pub struct MemberDeclaration {
    pub key: String,
    pub slot: Slot,
    pub enumerable: bool,
    pub level: Level,
    watch: Option<WatchDeclaration>,
}

impl MemberDeclaration {
    pub fn new(key: impl Into<String>, slot: Slot, enumerable: bool, level: Level) -> Self {
        let key = key.into();
        let watch = parse_watch_key(&key);
        Self {
            key,
            slot,
            enumerable,
            level,
            watch,
        }
    }

    pub fn kind(&self) -> MemberKind {
        match &self.slot {
            Slot::Data(Value::Function(_)) => MemberKind::Method,
            Slot::Data(_) => MemberKind::Value,
            Slot::Accessor {
                get: Some(_),
                set: Some(_),
            } => MemberKind::GetterSetter,
            Slot::Accessor { get: Some(_), .. } => MemberKind::Getter,
            Slot::Accessor { .. } => MemberKind::Setter,
        }
    }

    /// A getter wins over a watch key.
    pub fn treatment(&self) -> Treatment {
        if self.slot.getter().is_some() {
            return Treatment::Computed;
        }
        match &self.watch {
            Some(watch) => Treatment::Watch(watch.clone()),
            None => Treatment::Data,
        }
    }

    pub fn is_computed(&self) -> bool {
        self.slot.getter().is_some()
    }

    /// The parsed watch, unless the member is computed.
    pub fn watch(&self) -> Option<&WatchDeclaration> {
        if self.is_computed() {
            None
        } else {
            self.watch.as_ref()
        }
    }
}

/// Ordered `key -> declaration` mapping.
#[derive(Debug, Clone, Default)]
pub struct Declarations(IndexMap<String, MemberDeclaration>);

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration, replacing one with the same key in place.
    pub fn insert(&mut self, declaration: MemberDeclaration) {
        self.0.insert(declaration.key.clone(), declaration);
    }

    pub fn get(&self, key: &str) -> Option<&MemberDeclaration> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberDeclaration> {
        self.0.values()
    }

    /// Declarations with a getter.
    pub fn computed(&self) -> impl Iterator<Item = &MemberDeclaration> {
        self.iter().filter(|decl| decl.is_computed())
    }

    /// Declarations whose key declares a watch.
    pub fn watches(&self) -> impl Iterator<Item = (&MemberDeclaration, &WatchDeclaration)> {
        self.iter()
            .filter_map(|decl| decl.watch().map(|watch| (decl, watch)))
    }
}

/// Resolve the members of `class` and all its ancestors.
///
/// Reuses each ancestor's cached resolution, so the chain is walked once per
/// class. Class members are not enumerable.
pub fn resolve_class(class: &Class) -> Declarations {
    let mut declarations = class
        .parent()
        .map(|parent| Declarations::clone(&parent.declarations()))
        .unwrap_or_default();

    let level: Rc<str> = Rc::from(class.name());
    for (key, slot) in class.own_members() {
        declarations.insert(MemberDeclaration::new(
            key.clone(),
            slot.clone(),
            false,
            Level::Class(level.clone()),
        ));
    }
    declarations
}

/// Resolve the members visible on `object`: its class's members overlaid with
/// its own properties.
pub fn resolve_object(object: &Object) -> Declarations {
    let mut declarations = object
        .class()
        .map(|class| Declarations::clone(&class.declarations()))
        .unwrap_or_default();

    for (key, property) in object.own_properties() {
        declarations.insert(MemberDeclaration::new(
            key,
            property.slot,
            property.enumerable,
            Level::Instance,
        ));
    }
    declarations
}
