//! Definition merger.
//!
//! Combines, in ascending precedence, the pagination strategy's client
//! arguments, the registry endpoint definition and the request definition's
//! own endpoint overrides into one [`MergedRequest`]. Only endpoints the
//! registry marks `readonly` can be merged.

use harvest_types::{MergedEndpoint, RequestDefinition};
use harvest_util::merge_layers;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::definitions::DefinitionsSource;
use crate::error::FetchError;
use crate::model::PaginationDefinition;

/// A request definition resolved against the registry, ready for traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRequest {
    pub client_name: String,
    pub endpoint: MergedEndpoint,
    pub pagination: PaginationDefinition,
    pub call_args: CallArgs,
}

/// Arguments sent with every call of a merged endpoint, before `{arg}` substitution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub query_args: Map<String, Value>,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
}

impl CallArgs {
    /// Query args and headers, plus the body unless the endpoint omits it.
    pub fn from_endpoint(endpoint: &MergedEndpoint) -> Self {
        Self {
            query_args: endpoint.query_args.clone(),
            headers: endpoint.headers.clone(),
            body: if endpoint.omit_body { None } else { endpoint.body.clone() },
        }
    }
}

/// Resolves `request_definition` against the registry.
///
/// Fails with [`FetchError::EndpointNotFound`] when no endpoint is registered
/// for the client, path and method, and with [`FetchError::EndpointNotReadonly`]
/// when the registered endpoint is not readonly.
pub fn merge_request_definition(definitions: &dyn DefinitionsSource, request_definition: &RequestDefinition) -> Result<MergedRequest, FetchError> {
    let reference = &request_definition.endpoint;
    let client_name = reference
        .client
        .clone()
        .unwrap_or_else(|| definitions.default_client().to_string());
    let method = reference.method_or_default();

    let Some(endpoint) = definitions.query_endpoint(&client_name, &reference.path, method)? else {
        error!(
            adapter = %definitions.adapter_name(),
            client = %client_name,
            path = %reference.path,
            method = %method,
            "could not find endpoint for fetch request"
        );
        return Err(FetchError::EndpointNotFound {
            client: client_name,
            path: reference.path.clone(),
            method,
        });
    };
    if !endpoint.readonly {
        error!(
            adapter = %definitions.adapter_name(),
            client = %client_name,
            path = %reference.path,
            method = %method,
            "endpoint is not marked readonly, refusing to fetch"
        );
        return Err(FetchError::EndpointNotReadonly {
            client: client_name,
            path: reference.path.clone(),
            method,
        });
    }

    let pagination = match reference.pagination.as_ref().or(endpoint.pagination.as_ref()) {
        Some(pagination_id) => definitions
            .lookup_pagination(pagination_id)
            .cloned()
            .ok_or_else(|| FetchError::UnknownPagination {
                client: client_name.clone(),
                path: reference.path.clone(),
                pagination: pagination_id.clone(),
            })?,
        None => PaginationDefinition::none(),
    };

    let subject = || format!("{method} {} of client '{client_name}'", reference.path);
    let layers = [
        layer_value(&pagination.client_args, &subject)?,
        layer_value(&endpoint, &subject)?,
        layer_value(reference, &subject)?,
    ];
    let mut merged = merge_layers(&layers);
    if let Value::Object(merged_map) = &mut merged {
        merged_map.insert("method".into(), Value::String(method.as_str().into()));
        merged_map.insert("readonly".into(), Value::Bool(endpoint.readonly));
    }
    let endpoint: MergedEndpoint = serde_json::from_value(merged).map_err(|source| FetchError::InvalidDefinition { subject: subject(), source })?;

    debug!(
        adapter = %definitions.adapter_name(),
        client = %client_name,
        path = %endpoint.path,
        method = %endpoint.method,
        pagination = ?endpoint.pagination,
        "merged request definition"
    );

    Ok(MergedRequest {
        call_args: CallArgs::from_endpoint(&endpoint),
        client_name,
        endpoint,
        pagination,
    })
}

fn layer_value<T: Serialize>(layer: &T, subject: &dyn Fn() -> String) -> Result<Value, FetchError> {
    serde_json::to_value(layer).map_err(|source| FetchError::InvalidDefinition { subject: subject(), source })
}
