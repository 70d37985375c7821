//! Strings that carry serialized JSON objects or arrays.
//!
//! Only objects and arrays count as structured text. Scalars such as `"42"` or
//! `"true"` stay plain strings, and so does anything that fails to parse.

use serde_json::Value as JsonValue;

use crate::value::{Text, Value};

/// Decodes `text` when it holds a JSON object or array.
pub(crate) fn decode(text: &Text) -> Option<Value> {
    match serde_json::from_slice::<JsonValue>(text.as_bytes()).ok()? {
        json @ (JsonValue::Object(_) | JsonValue::Array(_)) => Some(Value::from(json)),
        _ => None,
    }
}

/// Encodes `value` as compact JSON text.
pub(crate) fn encode(value: &Value) -> Text {
    Text::from(value.to_json().to_string())
}
