//! Dynamic Values
//!
//! Stores are dynamic: their shape is declared at runtime by a model object or
//! a class, and watches address properties by name. This module provides the
//! value model the engine operates on.
//!
//! - [`Value`] - a dynamically typed value
//! - [`Object`] - a shared, ordered property table (data or accessor slots)
//! - [`Array`] - a shared, ordered list
//! - [`Function`] - a shared callable receiving `this` and arguments
//!
//! Objects and arrays are handles: cloning one yields another handle to the
//! same storage, and equality between them is identity. Once marked reactive,
//! reads record dependencies and changing writes notify dependents.

mod array;
mod function;
mod object;

use std::fmt::{self, Debug};
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

pub use array::Array;
pub use function::{Function, Getter, Setter};
pub use object::{Object, Property, Slot, WeakObject};

/// A dynamically typed value.
///
/// Equality follows SameValue: primitives compare by value (`NaN` equals
/// `NaN`, `0` and `-0` differ), objects, arrays and functions by identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Array),
    Object(Object),
    Function(Function),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object.clone()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<Array> {
        match self {
            Value::Array(array) => Some(array.clone()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<Function> {
        match self {
            Value::Function(function) => Some(function.clone()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// SameValue comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else if *a == 0.0 && *b == 0.0 {
                    a.is_sign_negative() == b.is_sign_negative()
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Copy object and array data recursively. Functions and accessors are
    /// shared; the copies are not reactive.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(array) => Value::Array(array.deep_clone()),
            Value::Object(object) => Value::Object(object.deep_clone()),
            other => other.clone(),
        }
    }

    /// Mark a nested object or array reactive when read through a reactive parent.
    pub(crate) fn into_reactive(self) -> Value {
        match &self {
            Value::Object(object) => {
                object.make_reactive();
            }
            Value::Array(array) => {
                array.make_reactive();
            }
            _ => {}
        }
        self
    }

    /// Convert to JSON. Cyclic structures are not supported.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(array) => array.fmt(f),
            Value::Object(object) => object.fmt(f),
            Value::Function(function) => function.fmt(f),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::String(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Array> for Value {
    fn from(value: Array) -> Self {
        Value::Array(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(Array::from_vec(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => {
                Value::Object(Object::from_pairs(map.into_iter().map(|(k, v)| (k, Value::from(v)))))
            }
        }
    }
}

/// Serializes like `JSON.stringify`: `undefined` and functions are skipped in
/// objects and become `null` elsewhere; integral numbers serialize as integers.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if !n.is_finite() {
                    serializer.serialize_unit()
                } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(array) => {
                let items = array.snapshot();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(object) => {
                let entries: Vec<(String, Value)> = object
                    .snapshot()
                    .into_iter()
                    .filter(|(_, value)| !matches!(value, Value::Undefined | Value::Function(_)))
                    .collect();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_semantics() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::Null, Value::Undefined);

        let a = Object::new();
        let b = Object::new();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(Object::new()), Value::from(b));
    }

    #[test]
    fn nullish_checks() {
        assert!(Value::Undefined.is_nullish());
        assert!(Value::Null.is_nullish());
        assert!(!Value::from(0).is_nullish());
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn json_conversion_keeps_structure() {
        let value = Value::from(json!({"a": {"b": [1, 2.5, null]}, "name": "store"}));
        let object = value.as_object().unwrap();
        assert_eq!(object.keys(), vec!["a", "name"]);
        assert_eq!(value.to_json(), json!({"a": {"b": [1, 2.5, null]}, "name": "store"}));
    }

    #[test]
    fn json_output_skips_undefined_and_functions() {
        let object = Object::from_pairs([
            ("kept", Value::from(1)),
            ("missing", Value::Undefined),
            ("method", Value::from(Function::new(|_, _| Ok(Value::Undefined)))),
        ]);
        let array = Value::from(vec![Value::Undefined, Value::from(true)]);

        assert_eq!(Value::from(object).to_json(), json!({"kept": 1}));
        assert_eq!(array.to_json(), json!([null, true]));
    }

    #[test]
    fn deep_clone_copies_containers() {
        let original = Value::from(json!({"inner": {"value": 1}}));
        let copy = original.deep_clone();
        assert_ne!(original, copy);

        let inner = copy.as_object().unwrap().get("inner").as_object().unwrap();
        inner.set("value", 2).unwrap();
        assert_eq!(original.to_json(), json!({"inner": {"value": 1}}));
    }
}
