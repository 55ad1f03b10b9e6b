use harvest_api::ClientError;
use harvest_types::HttpMethod;
use thiserror::Error;

/// Errors surfaced by the fetch engine.
///
/// Configuration errors are raised before any network call for the affected
/// request definition; transport errors abort the whole batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Could not find endpoint {method} {path} for client '{client}'")]
    EndpointNotFound { client: String, path: String, method: HttpMethod },

    #[error("Endpoint {method} {path} of client '{client}' is not marked readonly and cannot be used for fetch")]
    EndpointNotReadonly { client: String, path: String, method: HttpMethod },

    #[error("Unknown client '{client}'")]
    UnknownClient { client: String },

    #[error("Unknown pagination '{pagination}' referenced by {path} of client '{client}'")]
    UnknownPagination { client: String, path: String, pagination: String },

    #[error("Invalid definition for {subject}: {source}")]
    InvalidDefinition {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Request {method} {path} on client '{client}' failed: {source}")]
    Transport {
        client: String,
        method: HttpMethod,
        path: String,
        #[source]
        source: ClientError,
    },
}

impl FetchError {
    /// True for errors caused by the definition document rather than the remote service.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, FetchError::Transport { .. })
    }
}
