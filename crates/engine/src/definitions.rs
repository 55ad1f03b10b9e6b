//! Read-only access to the definition registry.
//!
//! The engine never walks [`ApiDefinitions`] directly; it asks a
//! [`DefinitionsSource`] for endpoints, request definitions and pagination
//! entries. Tests substitute small in-memory sources.

use harvest_types::{EndpointDefinition, HttpMethod, RequestDefinition};

use crate::error::FetchError;
use crate::model::{ApiDefinitions, PaginationDefinition};

pub trait DefinitionsSource: Send + Sync {
    /// Adapter name used in log fields.
    fn adapter_name(&self) -> &str;

    /// Client used when a request definition does not name one.
    fn default_client(&self) -> &str;

    /// Endpoint registered for `(client, path, method)`, if any.
    fn query_endpoint(&self, client: &str, path: &str, method: HttpMethod) -> Result<Option<EndpointDefinition>, FetchError>;

    /// All request definitions contributing records to `type_name`.
    fn query_request_definitions(&self, type_name: &str) -> Result<Vec<RequestDefinition>, FetchError>;

    fn lookup_pagination(&self, pagination: &str) -> Option<&PaginationDefinition>;
}

impl DefinitionsSource for ApiDefinitions {
    fn adapter_name(&self) -> &str {
        &self.adapter
    }

    fn default_client(&self) -> &str {
        &self.clients.default
    }

    fn query_endpoint(&self, client: &str, path: &str, method: HttpMethod) -> Result<Option<EndpointDefinition>, FetchError> {
        let client_definition = self
            .clients
            .options
            .get(client)
            .ok_or_else(|| FetchError::UnknownClient { client: client.to_string() })?;
        client_definition
            .endpoint(path, method)
            .map_err(|source| FetchError::InvalidDefinition {
                subject: format!("endpoint '{path}' of client '{client}'"),
                source,
            })
    }

    fn query_request_definitions(&self, type_name: &str) -> Result<Vec<RequestDefinition>, FetchError> {
        self.fetch
            .query_list(type_name)
            .map_err(|source| FetchError::InvalidDefinition {
                subject: format!("fetch definitions of type '{type_name}'"),
                source,
            })
    }

    fn lookup_pagination(&self, pagination: &str) -> Option<&PaginationDefinition> {
        self.pagination.get(pagination)
    }
}
