//! Shared, optionally reactive lists.
//!
//! A reactive array has a single source covering its length and every
//! element: any read tracks it, any change triggers it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::Value;
use crate::reactive::{Runtime, SourceId};

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    reactive: Cell<bool>,
    source: SourceId,
}

impl Drop for ArrayInner {
    fn drop(&mut self) {
        Runtime::forget_source(self.source);
    }
}

#[derive(Clone)]
pub struct Array(Rc<ArrayInner>);

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayInner {
            items: RefCell::new(items),
            reactive: Cell::new(false),
            source: SourceId::new(),
        }))
    }

    pub fn len(&self) -> usize {
        self.track_iteration();
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or `Undefined` when out of bounds.
    pub fn get(&self, index: usize) -> Value {
        self.track_iteration();
        let item = self.0.items.borrow().get(index).cloned();
        item.map_or(Value::Undefined, |value| self.wrap(value))
    }

    /// Write an element, padding with `Undefined` past the end.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let changed = {
            let mut items = self.0.items.borrow_mut();
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
                items[index] = value;
                true
            } else if items[index].same_value(&value) {
                false
            } else {
                items[index] = value;
                true
            }
        };
        if changed {
            self.trigger();
        }
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.items.borrow_mut().push(value.into());
        self.trigger();
    }

    pub fn pop(&self) -> Option<Value> {
        let item = self.0.items.borrow_mut().pop();
        if item.is_some() {
            self.trigger();
        }
        item
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let item = {
            let mut items = self.0.items.borrow_mut();
            (index < items.len()).then(|| items.remove(index))
        };
        if item.is_some() {
            self.trigger();
        }
        item
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.0.items.borrow_mut());
        if !removed.is_empty() {
            self.trigger();
        }
    }

    /// Copy of the elements. Tracks the whole array.
    pub fn to_vec(&self) -> Vec<Value> {
        self.track_iteration();
        let items = self.0.items.borrow().clone();
        if self.is_reactive() {
            items.into_iter().map(Value::into_reactive).collect()
        } else {
            items
        }
    }

    /// Copy of the elements without tracking.
    pub(crate) fn snapshot(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    pub fn make_reactive(&self) -> Self {
        self.0.reactive.set(true);
        self.clone()
    }

    pub fn is_reactive(&self) -> bool {
        self.0.reactive.get()
    }

    pub fn deep_clone(&self) -> Self {
        let items = self.0.items.borrow().iter().map(Value::deep_clone).collect();
        Self::from_vec(items)
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Record a dependency on the array's contents.
    pub(crate) fn track_iteration(&self) {
        if self.is_reactive() && Runtime::is_tracking() {
            Runtime::track(self.0.source);
        }
    }

    fn trigger(&self) {
        if self.is_reactive() {
            Runtime::trigger(self.0.source);
        }
    }

    fn wrap(&self, value: Value) -> Value {
        if self.is_reactive() {
            value.into_reactive()
        } else {
            value
        }
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[Array <borrowed>]"),
        }
    }
}
