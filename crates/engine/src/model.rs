//! # Adapter Definition Model
//!
//! The configuration document an adapter ships to describe its API surface:
//! named HTTP clients with their endpoint registries, the pagination table and
//! the fetch request definitions per resource type. Documents are loaded from
//! YAML or JSON once, validated, and shared read-only with the engine.
//!
//! ## Core Concepts
//!
//! - **ApiDefinitions**: the whole adapter document
//! - **DefaultWithCustomizations**: a default value deep-merged under keyed customizations
//! - **PaginationDefinition**: a continuation strategy plus the call arguments it contributes
//!
//! ## Usage
//!
//! ```rust
//! use harvest_engine::model::ApiDefinitions;
//!
//! let definitions: ApiDefinitions = serde_yaml::from_str(r#"
//! adapter: zendesk
//! clients:
//!   default: main
//!   options:
//!     main:
//!       base_url: https://example.zendesk.com
//!       endpoints:
//!         default:
//!           get: { readonly: true }
//!         customizations:
//!           /api/v2/groups: {}
//! "#)?;
//! assert_eq!(definitions.clients.default, "main");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use harvest_types::{EndpointDefaults, EndpointDefinition, HttpMethod, RequestDefinition};
use harvest_util::deep_merge;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level adapter definition document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiDefinitions {
    /// Adapter name, used in log fields.
    pub adapter: String,
    pub clients: ClientsDefinition,
    /// Pagination strategies keyed by identifier.
    #[serde(default)]
    pub pagination: IndexMap<String, PaginationDefinition>,
    /// Request definitions keyed by resource type name. Each customization is a
    /// list of request definitions; `default` applies to every element.
    #[serde(default)]
    pub fetch: DefaultWithCustomizations,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientsDefinition {
    /// Client used by request definitions that do not name one.
    pub default: String,
    #[serde(default)]
    pub options: IndexMap<String, ClientDefinition>,
}

/// One named HTTP client and its endpoint registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default headers; values may use `${env:NAME}`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// Endpoints keyed by path, each customization keyed by lower-case method.
    #[serde(default)]
    pub endpoints: DefaultWithCustomizations,
}

impl ClientDefinition {
    /// Looks up the endpoint registered for `path` and `method`.
    pub fn endpoint(&self, path: &str, method: HttpMethod) -> Result<Option<EndpointDefinition>, serde_json::Error> {
        let by_method = self.endpoints.query::<IndexMap<String, EndpointDefinition>>(path)?;
        Ok(by_method.and_then(|mut by_method| by_method.shift_remove(method.as_str())))
    }
}

/// A default value deep-merged underneath keyed customizations.
///
/// Values are kept as raw JSON until queried so that a partial customization
/// (say, only `pagination`) can inherit everything else from the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultWithCustomizations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub customizations: IndexMap<String, Value>,
}

impl DefaultWithCustomizations {
    pub fn new(default: Option<Value>, customizations: IndexMap<String, Value>) -> Self {
        Self { default, customizations }
    }

    /// Merges the default under `customizations[key]` and deserializes the result.
    ///
    /// Returns `Ok(None)` when `key` has no customization.
    pub fn query<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        let Some(customization) = self.customizations.get(key) else {
            return Ok(None);
        };
        serde_json::from_value(self.with_default(customization)).map(Some)
    }

    /// Like [`query`](Self::query) for list-valued customizations: the default
    /// applies to each element. A missing key yields an empty list.
    pub fn query_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, serde_json::Error> {
        match self.customizations.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(elements)) => elements
                .iter()
                .map(|element| serde_json::from_value(self.with_default(element)))
                .collect(),
            Some(single) => Ok(vec![serde_json::from_value(self.with_default(single))?]),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.customizations.keys().map(String::as_str)
    }

    fn with_default(&self, customization: &Value) -> Value {
        let mut merged = self.default.clone().unwrap_or(Value::Object(Default::default()));
        deep_merge(&mut merged, customization);
        merged
    }
}

/// A pagination table entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationDefinition {
    pub strategy: PaginationStrategy,
    /// Call arguments merged underneath every endpoint using this strategy.
    #[serde(default)]
    pub client_args: EndpointDefaults,
}

impl PaginationDefinition {
    /// Single page, no extra call arguments.
    pub fn none() -> Self {
        Self::default()
    }
}

/// How the next call is derived from the previous page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Exactly one page per context.
    #[default]
    None,
    /// Next token read from the page body and sent as a query argument.
    Token { token_field: String, param_name: String },
    /// Next page URL read from the page body.
    Cursor {
        next_page_field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path_checker: Option<String>,
    },
    /// Next page URL read from the `rel="next"` entry of the `link` header.
    LinkHeader {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path_checker: Option<String>,
    },
    /// Page-number pagination.
    PageOffset {
        param_name: String,
        #[serde(default = "default_first_page")]
        first_page: u64,
        page_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items_field: Option<String>,
    },
    /// Item-offset pagination.
    ItemOffset {
        param_name: String,
        #[serde(default)]
        first_index: u64,
        page_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items_field: Option<String>,
    },
}

fn default_first_page() -> u64 {
    1
}

impl ApiDefinitions {
    /// Deserializes every customization eagerly so a malformed document fails
    /// at load time rather than mid-fetch.
    pub fn validate(&self) -> Result<(), (String, serde_json::Error)> {
        for (client_name, client) in &self.clients.options {
            for path in client.endpoints.keys() {
                client
                    .endpoints
                    .query::<IndexMap<String, EndpointDefinition>>(path)
                    .map_err(|error| (format!("endpoint '{path}' of client '{client_name}'"), error))?;
            }
        }
        for type_name in self.fetch.keys() {
            self.fetch
                .query_list::<RequestDefinition>(type_name)
                .map_err(|error| (format!("fetch definitions of type '{type_name}'"), error))?;
        }
        Ok(())
    }
}
