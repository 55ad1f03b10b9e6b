//! Dotted-path navigation over JSON values.

use serde_json::Value;

/// Navigate `value` along a dotted path (`links.next`, `data.items.0.id`).
///
/// Object segments select keys; numeric segments index into arrays. An empty
/// path or `"."` returns the value itself. Returns `None` when any segment is
/// missing.
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a scalar JSON value as plain text (strings without quotes).
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
