//! Loose-record access over arbitrary JSON.
//!
//! Third-party APIs agree on nothing, so every parser branch reads fields
//! through [`LooseRecord`]: give it an ordered list of candidate keys (dotted
//! paths allowed, e.g. `source.name`) and it returns the first present
//! scalar as a string.

use serde_json::Value;

/// Borrowed view of one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct LooseRecord<'a> {
    value: &'a Value,
}

impl<'a> LooseRecord<'a> {
    /// Wrap `value` if it is a JSON object.
    pub fn new(value: &'a Value) -> Option<Self> {
        value.is_object().then_some(Self { value })
    }

    /// Resolve a dotted path (`source.name`) to a value.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        path.split('.')
            .try_fold(self.value, |cur, key| cur.as_object()?.get(key))
    }

    /// First candidate path whose value is a non-empty scalar, coerced to a
    /// string. Falls back to `default`.
    ///
    /// Strings are trimmed, numbers keep their JSON rendering and booleans
    /// become `"true"`/`"false"`. Arrays, objects, null and blank strings
    /// count as absent.
    pub fn get_string(&self, paths: &[&str], default: &str) -> String {
        self.get_opt(paths).unwrap_or_else(|| default.to_string())
    }

    /// Like [`get_string`](Self::get_string) but `None` when nothing matches.
    pub fn get_opt(&self, paths: &[&str]) -> Option<String> {
        paths
            .iter()
            .filter_map(|p| self.get(p).and_then(scalar_to_string))
            .next()
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// A list whose first element is itself an object.
pub fn is_record_list(v: &Value) -> bool {
    matches!(v.as_array().and_then(|a| a.first()), Some(Value::Object(_)))
}

/// Locate the item list of a response.
///
/// Tries each of `keys` at the top level first; if none holds an array and
/// the root itself is an array, the root is the list.
pub fn list_at<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(obj) = root.as_object() {
        return keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_array));
    }
    root.as_array()
}

/// Best-effort search for the first list of records in an unknown response.
///
/// Checks the root, then each top-level value, then the values of top-level
/// objects, each level in document order. It stops there: deeper nesting is
/// not explored.
pub fn find_record_list(root: &Value) -> Option<&Vec<Value>> {
    if is_record_list(root) {
        return root.as_array();
    }
    let obj = root.as_object()?;
    if let Some(list) = obj.values().find(|v| is_record_list(v)) {
        return list.as_array();
    }
    obj.values()
        .filter_map(Value::as_object)
        .flat_map(|nested| nested.values())
        .find(|v| is_record_list(v))
        .and_then(Value::as_array)
}
