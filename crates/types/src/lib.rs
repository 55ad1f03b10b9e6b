use std::{error::Error, fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod definitions;

pub use definitions::{EndpointDefaults, EndpointDefinition, EndpointReference, MergedEndpoint, RequestDefinition, Transformation};

/// One concrete binding of argument-root names to values.
///
/// Contexts instantiate templated paths, query arguments, headers and bodies
/// (`/groups/{parent.id}/members`) and travel with every extracted item so
/// callers can correlate children with the parent that produced them.
pub type Context = Map<String, Value>;

/// Pool of candidate values per argument root, e.g. every known parent id.
pub type PossibleArgs = IndexMap<String, Vec<Value>>;

/// HTTP verb used by an endpoint.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Head => "head",
            Self::Options => "options",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ParseHttpMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "head" => Ok(Self::Head),
            "options" => Ok(Self::Options),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            _ => Err(ParseHttpMethodError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHttpMethodError(String);

impl fmt::Display for ParseHttpMethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid http method '{}'", self.0)
    }
}

impl Error for ParseHttpMethodError {}

/// A single, fully resolved HTTP call issued by the fetch engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// HTTP verb.
    #[serde(default)]
    pub method: HttpMethod,
    /// API-relative path with every placeholder substituted.
    pub path: String,
    /// Query arguments; array values repeat the key on the wire.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub query_args: Map<String, Value>,
    /// Request headers.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// JSON body, when the endpoint sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Stable textual fingerprint used to detect repeated calls.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{} {}", self.method, self.path))
    }
}

/// One raw response payload for one HTTP call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Parsed JSON body (`Value::Null` for empty bodies).
    pub data: Value,
    /// Response headers keyed by lower-cased name.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// HTTP status code.
    #[serde(default)]
    pub status: u16,
}

impl Page {
    /// Builds a successful page carrying only a body.
    pub fn from_data(data: Value) -> Self {
        Self {
            data,
            headers: IndexMap::new(),
            status: 200,
        }
    }

    /// Adds a response header, normalizing its name to lower case.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Identifies the resource type a fetch is performed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Resource type name (e.g. `"Ticket"`).
    pub type_name: String,
}

impl ResourceIdentifier {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

/// Result of applying a transformation to a page; not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub value: Value,
    pub type_name: String,
    pub context: Context,
}

/// A [`GeneratedItem`] whose value is known to be a plain key/value record.
///
/// This is the public output unit of the fetch engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueGeneratedItem {
    pub value: Map<String, Value>,
    pub type_name: String,
    pub context: Context,
}

impl TryFrom<GeneratedItem> for ValueGeneratedItem {
    type Error = GeneratedItem;

    /// Accepts only object values; any other shape is handed back unchanged.
    fn try_from(item: GeneratedItem) -> Result<Self, Self::Error> {
        match item.value {
            Value::Object(value) => Ok(Self {
                value,
                type_name: item.type_name,
                context: item.context,
            }),
            value => Err(GeneratedItem { value, ..item }),
        }
    }
}
