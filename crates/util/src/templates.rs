//! `{arg}` placeholder discovery and substitution.
//!
//! Endpoint paths, query arguments, headers and bodies may reference context
//! values with `{name}` or dotted `{parent.id}` placeholders. A string that
//! consists of exactly one placeholder is replaced by the raw JSON value so
//! numbers and objects keep their type; placeholders embedded in longer text
//! are rendered as plain text. Unresolvable placeholders are left untouched.

use harvest_types::Context;
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::json_path::{value_at_path, value_to_plain_string};

static ARG_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([\w.\-\[\]]+)\}").expect("placeholder pattern compiles"));

/// Bytes outside the RFC3986 unreserved set are encoded in path values.
const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Extracts placeholder names from a string, without the surrounding braces.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    ARG_PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Collects placeholder names from every string inside a JSON value tree.
pub fn collect_placeholders_from_value(value: &Value, found: &mut IndexSet<String>) {
    match value {
        Value::String(text) => found.extend(extract_placeholders(text)),
        Value::Array(values) => {
            for nested in values {
                collect_placeholders_from_value(nested, found);
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_placeholders_from_value(nested, found);
            }
        }
        _ => {}
    }
}

/// Looks up a possibly dotted argument name (`parent.id`) in a context.
pub fn lookup_arg<'a>(context: &'a Context, name: &str) -> Option<&'a Value> {
    let (root, rest) = name.split_once('.').unwrap_or((name, ""));
    let root_value = context.get(root)?;
    value_at_path(root_value, rest)
}

/// Substitutes placeholders in a single string.
pub fn replace_args_in_string(text: &str, context: &Context) -> Value {
    if let Some(caps) = ARG_PLACEHOLDER.captures(text)
        && caps.get(0).is_some_and(|whole| whole.as_str() == text)
        && let Some(value) = lookup_arg(context, &caps[1])
    {
        return value.clone();
    }

    let replaced = ARG_PLACEHOLDER.replace_all(text, |caps: &Captures| match lookup_arg(context, &caps[1]) {
        Some(value) => value_to_plain_string(value),
        None => caps[0].to_string(),
    });
    Value::String(replaced.into_owned())
}

/// Recursively substitutes placeholders in every string of a JSON value.
pub fn replace_args_in_value(value: &Value, context: &Context) -> Value {
    match value {
        Value::String(text) => replace_args_in_string(text, context),
        Value::Array(values) => Value::Array(values.iter().map(|nested| replace_args_in_value(nested, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| (key.clone(), replace_args_in_value(nested, context)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Substitutes placeholders in header values; headers always stay strings.
pub fn replace_args_in_headers(headers: &IndexMap<String, String>, context: &Context) -> IndexMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let replaced = match replace_args_in_string(value, context) {
                Value::String(text) => text,
                other => value_to_plain_string(&other),
            };
            (name.clone(), replaced)
        })
        .collect()
}

/// Resolves a path template, percent-encoding substituted values.
///
/// ```rust
/// use harvest_util::build_path;
/// use serde_json::json;
///
/// let context = json!({ "parent": { "id": "team/a" } }).as_object().cloned().unwrap();
/// assert_eq!(build_path("/groups/{parent.id}/members", &context), "/groups/team%2Fa/members");
/// assert_eq!(build_path("/groups/{missing}", &context), "/groups/{missing}");
/// ```
pub fn build_path(template: &str, context: &Context) -> String {
    ARG_PLACEHOLDER
        .replace_all(template, |caps: &Captures| match lookup_arg(context, &caps[1]) {
            Some(value) => utf8_percent_encode(&value_to_plain_string(value), PATH_VALUE).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> Context {
        value.as_object().cloned().expect("context object")
    }

    #[test]
    fn extracts_plain_and_dotted_placeholders() {
        let names = extract_placeholders("/groups/{parent.id}/members/{member_id}?x={}");
        assert_eq!(names, vec!["parent.id".to_string(), "member_id".to_string()]);
    }

    #[test]
    fn collects_placeholders_from_nested_values() {
        let mut found = IndexSet::new();
        collect_placeholders_from_value(&json!({ "filter": ["{brand.id}", { "q": "name:{name}" }], "n": 3 }), &mut found);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["brand.id".to_string(), "name".to_string()]);
    }

    #[test]
    fn whole_placeholder_keeps_json_type() {
        let ctx = context(json!({ "parent": { "id": 42, "tags": ["a"] } }));
        assert_eq!(replace_args_in_string("{parent.id}", &ctx), json!(42));
        assert_eq!(replace_args_in_string("{parent.tags}", &ctx), json!(["a"]));
    }

    #[test]
    fn embedded_placeholders_render_as_text() {
        let ctx = context(json!({ "parent": { "id": 42 }, "name": "ops" }));
        assert_eq!(replace_args_in_string("id:{parent.id} team:{name}", &ctx), json!("id:42 team:ops"));
    }

    #[test]
    fn unresolved_placeholders_are_left_untouched() {
        let ctx = context(json!({}));
        assert_eq!(replace_args_in_string("{parent.id}", &ctx), json!("{parent.id}"));
        let body = replace_args_in_value(&json!({ "ids": ["{parent.id}"] }), &ctx);
        assert_eq!(body, json!({ "ids": ["{parent.id}"] }));
    }

    #[test]
    fn headers_are_stringified() {
        let ctx = context(json!({ "brand": 7 }));
        let headers = IndexMap::from([("X-Brand".to_string(), "{brand}".to_string())]);
        let replaced = replace_args_in_headers(&headers, &ctx);
        assert_eq!(replaced.get("X-Brand").map(String::as_str), Some("7"));
    }

    #[test]
    fn build_path_preserves_unreserved_identifier_bytes() {
        let ctx = context(json!({ "service_id": "srv-d5f6a7b8" }));
        assert_eq!(build_path("/v1/services/{service_id}", &ctx), "/v1/services/srv-d5f6a7b8");
    }

    #[test]
    fn build_path_encodes_reserved_bytes() {
        let ctx = context(json!({ "project": "team/app name" }));
        assert_eq!(build_path("/v1/projects/{project}", &ctx), "/v1/projects/team%2Fapp%20name");
    }
}
