//! Item extraction and validation.
//!
//! Every page is mapped through the request definition's [`Transformation`]
//! into candidate records; candidates carry the context of the traversal that
//! produced them. Validation then keeps only plain key/value records.

use harvest_types::{Context, GeneratedItem, HttpMethod, RequestDefinition, Transformation, ValueGeneratedItem};
use harvest_util::value_at_path;
use serde_json::{Map, Value};
use tracing::warn;

use crate::pagination::PagesWithContext;

/// Applies one request definition's transformation to traversal output.
#[derive(Debug, Clone)]
pub struct ItemExtractor<'a> {
    transformation: &'a Transformation,
    type_name: &'a str,
    context_defaults: &'a Context,
}

impl<'a> ItemExtractor<'a> {
    pub fn new(request_definition: &'a RequestDefinition, type_name: &'a str) -> Self {
        Self {
            transformation: &request_definition.transformation,
            type_name,
            context_defaults: &request_definition.context,
        }
    }

    /// Lazily extracts items from every page, in context and page order.
    ///
    /// Each item carries the context its page was fetched under, replacing the
    /// static context the transformation saw.
    pub fn extract<'p>(&'p self, pages_with_context: &'p [PagesWithContext]) -> impl Iterator<Item = GeneratedItem> + 'p {
        pages_with_context.iter().flat_map(move |traversal| {
            traversal.pages.iter().flat_map(move |page| {
                self.transform_page(&page.data).into_iter().map(move |item| GeneratedItem {
                    context: traversal.context.clone(),
                    ..item
                })
            })
        })
    }

    /// Candidate items for one page, tagged with the type name and the
    /// request definition's static context.
    pub fn transform_page(&self, data: &Value) -> Vec<GeneratedItem> {
        let root = match self.transformation.root.as_deref() {
            Some(root) => value_at_path(data, root),
            None => Some(data),
        };
        let mut candidates = match root {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values.clone(),
            Some(value) => vec![value.clone()],
        };

        if self.transformation.single && candidates.len() > 1 {
            warn!(
                type_name = %self.type_name,
                candidate_count = candidates.len(),
                "expected a single item per page, keeping the first"
            );
            candidates.truncate(1);
        }

        candidates
            .into_iter()
            .map(|candidate| GeneratedItem {
                value: self.shape(candidate),
                type_name: self.type_name.to_string(),
                context: self.context_defaults.clone(),
            })
            .collect()
    }

    fn shape(&self, candidate: Value) -> Value {
        let candidate = match candidate {
            Value::Object(mut record) => {
                if let Some(pick) = &self.transformation.pick {
                    record.retain(|key, _| pick.iter().any(|picked| picked == key));
                }
                if let Some(omit) = &self.transformation.omit {
                    record.retain(|key, _| !omit.iter().any(|omitted| omitted == key));
                }
                Value::Object(record)
            }
            other => other,
        };
        match &self.transformation.nest_under_field {
            Some(field) => Value::Object(Map::from_iter([(field.clone(), candidate)])),
            None => candidate,
        }
    }
}

/// Keeps plain key/value records; anything else is dropped with a warning.
pub fn validate_items(
    items: impl IntoIterator<Item = GeneratedItem>,
    client_name: &str,
    path: &str,
    method: HttpMethod,
) -> Vec<ValueGeneratedItem> {
    items
        .into_iter()
        .filter_map(|item| match ValueGeneratedItem::try_from(item) {
            Ok(valid) => Some(valid),
            Err(rejected) => {
                warn!(
                    client = %client_name,
                    path,
                    method = %method,
                    type_name = %rejected.type_name,
                    value = %rejected.value,
                    "dropping item that is not a plain object"
                );
                None
            }
        })
        .collect()
}
