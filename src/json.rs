//! JSON <-> ABC value conversion and dotted-path field access.
//!
//! Parsed JSON objects stay wrapped as opaque [`Value::Json`] handles; user
//! code reaches into them with `field "a.b.c" from data`. Arrays lift to
//! lists, numbers truncate to 64-bit integers.

use crate::value::Value;
use std::sync::Arc;

/// Lift a decoded JSON value into an ABC value.
///
/// Objects remain opaque Json handles so nested documents can be traversed
/// with `field ... from`; everything else becomes the obvious counterpart.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            // fractional and out-of-range numbers truncate
            None => Value::Integer(n.as_f64().unwrap_or(0.0) as i64),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::list(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(_) => Value::Json(Arc::new(json.clone())),
    }
}

/// Lower an ABC value to the JSON data model.
///
/// Values with no JSON form (functions, responses, servers) become null;
/// `encode ... as json` rejects them before this point when they appear at
/// the top level.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        Value::List(elements) => {
            let elements = elements.lock().unwrap();
            serde_json::Value::Array(elements.iter().map(value_to_json).collect())
        }
        Value::Json(json) => json.as_ref().clone(),
        _ => serde_json::Value::Null,
    }
}

/// Resolve a dotted path (`"a.b.c"`) against a JSON document.
///
/// Only object fields are traversed; any non-object on the path or missing
/// key yields Null. The terminal value is lifted with [`json_to_value`].
pub fn get_json_field(data: &serde_json::Value, path: &str) -> Value {
    let mut current = data;

    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => match map.get(part) {
                Some(next) => current = next,
                None => return Value::Null,
            },
            _ => return Value::Null,
        }
    }

    json_to_value(current)
}
