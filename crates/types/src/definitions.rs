//! Declarative endpoint and request definitions.
//!
//! These structures are deserialized from adapter definition documents and
//! deep-merged by the engine. Optional fields skip serialization when unset so
//! that an absent value in a higher-precedence layer never erases a value set
//! by a lower one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Context, HttpMethod};

/// Default call arguments shared by endpoint definitions and pagination strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefaults {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub query_args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit_body: Option<bool>,
}

/// Registry entry for one `(client, path, method)` tuple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub query_args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit_body: Option<bool>,
    /// Pagination strategy identifier from the adapter's pagination table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    /// Only readonly endpoints may be used by the fetch engine.
    #[serde(default)]
    pub readonly: bool,
}

/// The endpoint a request definition targets, plus request-specific overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointReference {
    /// Templated API path (e.g. `/api/v2/groups/{parent.id}/members`).
    pub path: String,
    /// Defaults to `get` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    /// Client override; the adapter's default client is used otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub query_args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit_body: Option<bool>,
}

impl EndpointReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn method_or_default(&self) -> HttpMethod {
        self.method.unwrap_or_default()
    }
}

/// Declarative extraction rule mapping a raw page into candidate records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// Dotted path of the sub-structure holding the records; the whole page when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Keep only these keys of each record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick: Option<Vec<String>>,
    /// Drop these keys from each record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omit: Option<Vec<String>>,
    /// Wrap each record as `{ <field>: record }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nest_under_field: Option<String>,
    /// Keep only the first record of each page.
    #[serde(default)]
    pub single: bool,
}

/// One logical fetch contributing records to a resource type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDefinition {
    pub endpoint: EndpointReference,
    #[serde(default)]
    pub transformation: Transformation,
    /// Static context defaults attached to every extracted item.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Context,
}

/// Fully merged endpoint: pagination defaults, registry definition and request overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedEndpoint {
    pub path: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub pagination: Option<String>,
    #[serde(default)]
    pub query_args: Map<String, Value>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub omit_body: bool,
    #[serde(default)]
    pub readonly: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_definition_from_yaml_minimal() {
        let yaml = r#"
endpoint:
  path: /api/v2/tickets
transformation:
  root: tickets
"#;
        let definition: RequestDefinition = serde_yaml::from_str(yaml).expect("deserialize RequestDefinition");
        assert_eq!(definition.endpoint.path, "/api/v2/tickets");
        assert_eq!(definition.endpoint.method_or_default(), HttpMethod::Get);
        assert_eq!(definition.transformation.root.as_deref(), Some("tickets"));
        assert!(!definition.transformation.single);
        assert!(definition.context.is_empty());
    }

    #[test]
    fn endpoint_reference_skips_unset_fields_when_serialized() {
        let reference = EndpointReference::new("/groups");
        let encoded = serde_json::to_value(&reference).expect("serialize reference");
        assert_eq!(encoded, json!({ "path": "/groups" }));
    }

    #[test]
    fn endpoint_definition_defaults_to_not_readonly() {
        let definition: EndpointDefinition = serde_json::from_value(json!({ "pagination": "cursor" })).expect("deserialize");
        assert!(!definition.readonly);
        assert_eq!(definition.pagination.as_deref(), Some("cursor"));
    }
}
