//! Deep merge of JSON values with "later layer wins" precedence.

use serde_json::Value;

/// Merges `overlay` into `target`.
///
/// - Objects merge key by key, recursing into keys present on both sides.
/// - Scalars and arrays from `overlay` replace the target value wholesale;
///   arrays are never concatenated.
/// - `null` in `overlay` is skipped, so an unset field never erases a value
///   from a lower-precedence layer.
pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (_, Value::Null) => {}
        (Value::Object(target_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if overlay_value.is_null() {
                    continue;
                }
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, overlay_value),
                    None => {
                        target_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

/// Merges a sequence of layers in ascending precedence (first = lowest).
pub fn merge_layers<'a, I>(layers: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut merged = Value::Object(serde_json::Map::new());
    for layer in layers {
        deep_merge(&mut merged, layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_layers_take_precedence() {
        let pagination_defaults = json!({ "query_args": { "a": 1, "b": 2 } });
        let endpoint = json!({ "query_args": { "b": 3, "c": 4 } });
        let request = json!({ "query_args": { "c": 5 } });

        let merged = merge_layers([&pagination_defaults, &endpoint, &request]);

        assert_eq!(merged, json!({ "query_args": { "a": 1, "b": 3, "c": 5 } }));
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let mut target = json!({ "fields": ["id", "name"], "nested": { "tags": [1] } });
        deep_merge(&mut target, &json!({ "fields": ["url"], "nested": { "tags": [] } }));
        assert_eq!(target, json!({ "fields": ["url"], "nested": { "tags": [] } }));
    }

    #[test]
    fn null_overlay_values_are_ignored() {
        let mut target = json!({ "pagination": "cursor", "body": { "a": 1 } });
        deep_merge(&mut target, &json!({ "pagination": null, "body": { "a": null, "b": 2 } }));
        assert_eq!(target, json!({ "pagination": "cursor", "body": { "a": 1, "b": 2 } }));
    }

    #[test]
    fn scalar_overlay_replaces_object() {
        let mut target = json!({ "body": { "a": 1 } });
        deep_merge(&mut target, &json!({ "body": "raw" }));
        assert_eq!(target, json!({ "body": "raw" }));
    }
}
