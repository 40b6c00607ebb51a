//! Path resolution for watch targets.

use crate::value::Value;

/// Walk `path` starting at `root`.
///
/// Resolution is total: a `null` or `undefined` intermediate yields
/// `Undefined`, as does a segment the value doesn't have. Arrays accept
/// numeric indices and `length`; strings accept `length`. Reads through
/// reactive objects are tracked.
pub fn resolve_path<S: AsRef<str>>(root: &Value, path: &[S]) -> Value {
    let mut value = root.clone();
    for segment in path {
        if value.is_nullish() {
            return Value::Undefined;
        }
        value = step(&value, segment.as_ref());
    }
    value
}

fn step(value: &Value, segment: &str) -> Value {
    match value {
        Value::Object(object) => object.get(segment),
        Value::Array(array) => {
            if segment == "length" {
                Value::from(array.len())
            } else {
                segment
                    .parse::<usize>()
                    .map_or(Value::Undefined, |index| array.get(index))
            }
        }
        Value::String(s) if segment == "length" => Value::from(s.encode_utf16().count()),
        _ => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_leaf() {
        let root = Value::from(json!({"a": {"b": {"c": 5}}}));
        assert_eq!(resolve_path(&root, &["a", "b", "c"]), Value::from(5));
    }

    #[test]
    fn null_intermediate_yields_undefined() {
        let root = Value::from(json!({"a": null}));
        assert_eq!(resolve_path(&root, &["a", "b"]), Value::Undefined);
    }

    #[test]
    fn undefined_root_yields_undefined() {
        assert_eq!(resolve_path(&Value::Undefined, &["a"]), Value::Undefined);
        assert_eq!(resolve_path(&Value::Null, &["a"]), Value::Undefined);
    }

    #[test]
    fn null_leaf_is_kept() {
        let root = Value::from(json!({"a": null}));
        assert_eq!(resolve_path(&root, &["a"]), Value::Null);
    }

    #[test]
    fn empty_path_is_the_root() {
        let root = Value::from(3);
        assert_eq!(resolve_path::<&str>(&root, &[]), Value::from(3));
    }

    #[test]
    fn arrays_and_strings() {
        let root = Value::from(json!({"items": [10, 20], "name": "abc"}));
        assert_eq!(resolve_path(&root, &["items", "1"]), Value::from(20));
        assert_eq!(resolve_path(&root, &["items", "length"]), Value::from(2));
        assert_eq!(resolve_path(&root, &["items", "x"]), Value::Undefined);
        assert_eq!(resolve_path(&root, &["name", "length"]), Value::from(3));
        assert_eq!(resolve_path(&root, &["name", "x", "y"]), Value::Undefined);
    }
}
