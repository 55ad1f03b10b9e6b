//! Argument combination generator.
//!
//! A merged endpoint references context values through `{name}` placeholders.
//! Only the roots it actually references (`parent` for `{parent.id}`) take
//! part in the Cartesian product over the caller's argument pool.

use harvest_types::{Context, MergedEndpoint, PossibleArgs};
use harvest_util::{collect_placeholders_from_value, extract_placeholders};
use indexmap::IndexSet;
use serde_json::Value;

/// Distinct placeholder names in the endpoint's path, query args, headers and body.
pub fn find_unresolved_args(endpoint: &MergedEndpoint) -> IndexSet<String> {
    let mut found: IndexSet<String> = extract_placeholders(&endpoint.path).into_iter().collect();
    for value in endpoint.query_args.values() {
        collect_placeholders_from_value(value, &mut found);
    }
    for value in endpoint.headers.values() {
        found.extend(extract_placeholders(value));
    }
    if let Some(body) = &endpoint.body {
        collect_placeholders_from_value(body, &mut found);
    }
    found
}

/// The segment before the first `.` of each argument name, deduplicated.
pub fn relevant_arg_roots<'a>(args: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let roots: IndexSet<String> = args
        .into_iter()
        .filter_map(|arg| arg.split('.').next())
        .filter(|root| !root.is_empty())
        .map(str::to_string)
        .collect();
    roots.into_iter().collect()
}

/// Cartesian product of the pool's candidates for `roots`.
///
/// Duplicate candidates of a root are collapsed. A root with no candidates
/// yields no contexts at all; no roots yields a single empty context.
pub fn compute_arg_combinations(possible_args: &PossibleArgs, roots: &[String]) -> Vec<Context> {
    let mut combinations = vec![Context::new()];
    for root in roots {
        let candidates = distinct_values(possible_args.get(root).map(Vec::as_slice).unwrap_or_default());
        if candidates.is_empty() {
            return Vec::new();
        }
        combinations = combinations
            .into_iter()
            .flat_map(|context| {
                candidates.iter().map(move |candidate| {
                    let mut extended = context.clone();
                    extended.insert(root.clone(), (*candidate).clone());
                    extended
                })
            })
            .collect();
    }
    combinations
}

fn distinct_values(values: &[Value]) -> Vec<&Value> {
    let mut distinct: Vec<&Value> = Vec::with_capacity(values.len());
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn pool(entries: &[(&str, Vec<Value>)]) -> PossibleArgs {
        entries.iter().map(|(name, values)| (name.to_string(), values.clone())).collect()
    }

    #[test]
    fn finds_placeholders_in_every_part_of_the_endpoint() {
        let endpoint = MergedEndpoint {
            path: "/groups/{parent.id}/members".into(),
            query_args: json!({ "brand": "{brand.id}", "size": 10 }).as_object().cloned().expect("object"),
            headers: IndexMap::from([("X-Org".to_string(), "{org}".to_string())]),
            body: Some(json!({ "filter": ["{parent.name}"] })),
            ..Default::default()
        };

        let args = find_unresolved_args(&endpoint);

        assert_eq!(
            args.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["parent.id", "brand.id", "org", "parent.name"]
        );
        assert_eq!(relevant_arg_roots(&args), vec!["parent", "brand", "org"]);
    }

    #[test]
    fn only_relevant_roots_are_combined() {
        let possible_args = pool(&[("parent", vec![json!({ "id": 1 }), json!({ "id": 2 })]), ("sibling", vec![json!(9)])]);

        let contexts = compute_arg_combinations(&possible_args, &["parent".to_string()]);

        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].get("parent"), Some(&json!({ "id": 1 })));
        assert_eq!(contexts[1].get("parent"), Some(&json!({ "id": 2 })));
        assert!(contexts.iter().all(|context| !context.contains_key("sibling")));
    }

    #[test]
    fn product_covers_every_combination_without_duplicates() {
        let possible_args = pool(&[("a", vec![json!(1), json!(2), json!(1)]), ("b", vec![json!("x"), json!("y")])]);

        let contexts = compute_arg_combinations(&possible_args, &["a".to_string(), "b".to_string()]);

        let rendered: Vec<Value> = contexts.into_iter().map(Value::Object).collect();
        assert_eq!(
            rendered,
            vec![
                json!({ "a": 1, "b": "x" }),
                json!({ "a": 1, "b": "y" }),
                json!({ "a": 2, "b": "x" }),
                json!({ "a": 2, "b": "y" }),
            ]
        );
    }

    #[test]
    fn missing_or_empty_root_yields_no_contexts() {
        let possible_args = pool(&[("parent", vec![])]);
        assert!(compute_arg_combinations(&possible_args, &["parent".to_string()]).is_empty());
        assert!(compute_arg_combinations(&possible_args, &["absent".to_string()]).is_empty());
    }

    #[test]
    fn no_roots_yields_one_empty_context() {
        let contexts = compute_arg_combinations(&PossibleArgs::new(), &[]);
        assert_eq!(contexts, vec![Context::new()]);
    }
}
