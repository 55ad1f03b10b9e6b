//! # Harvest Engine
//!
//! The Harvest Engine turns declarative request definitions into validated
//! records fetched from a remote HTTP API. It is read-only by construction:
//! only endpoints the adapter's registry marks `readonly` can be called.
//!
//! ## Key Features
//!
//! - **Definition Merging**: Pagination defaults, registry endpoint and request overrides, deep-merged
//! - **Argument Expansion**: Cartesian product over the context roots an endpoint actually references
//! - **Pagination**: Token, cursor, link-header, page and item offset strategies
//! - **Extraction**: Root selection, pick/omit, nesting, and plain-record validation
//!
//! ## Usage
//!
//! ```rust
//! use harvest_engine::load_definitions_file;
//!
//! let temp_dir = tempfile::tempdir()?;
//! let definitions_path = temp_dir.path().join("zendesk.yaml");
//! std::fs::write(&definitions_path, r#"
//! adapter: zendesk
//! clients:
//!   default: main
//!   options:
//!     main:
//!       base_url: https://example.zendesk.com
//! "#)?;
//!
//! let definitions = load_definitions_file(&definitions_path)?;
//! assert_eq!(definitions.adapter, "zendesk");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`model`**: The adapter definition document
//! - **`definitions`**: Read-only registry access used by the engine
//! - **`merge`**: Definition merger and readonly guard
//! - **`arguments`**: Placeholder discovery and argument combinations
//! - **`pagination`**: Strategies and the per-context traversal loop
//! - **`extract`**: Transformation and validation of fetched pages
//! - **`requester`**: The façade tying the pipeline together

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use harvest_api::{HarvestClient, HttpClient};
use harvest_util::interpolate_headers;
use tracing::debug;

pub mod arguments;
pub mod definitions;
pub mod error;
pub mod extract;
pub mod merge;
pub mod model;
pub mod pagination;
pub mod requester;

pub use definitions::DefinitionsSource;
pub use error::FetchError;
pub use extract::{ItemExtractor, validate_items};
pub use merge::{CallArgs, MergedRequest, merge_request_definition};
pub use model::{ApiDefinitions, DefaultWithCustomizations, PaginationDefinition, PaginationStrategy};
pub use pagination::{MAX_PAGES_PER_CONTEXT, PageTraversal, PagesWithContext};
pub use requester::{HttpClients, Requester};

/// Loads an adapter definition document with format detection.
///
/// Files ending in `.json` are parsed as JSON; anything else as YAML. Every
/// endpoint and fetch customization is deserialized once so malformed
/// entries are reported here rather than during a fetch.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML/JSON, or
/// contains a customization that does not match the definition model.
pub fn load_definitions_file(file_path: impl AsRef<Path>) -> Result<ApiDefinitions> {
    let file_path = file_path.as_ref();
    let file_content =
        fs::read_to_string(file_path).with_context(|| format!("Failed to read definitions file: {}", file_path.display()))?;

    let is_json = file_path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    let definitions: ApiDefinitions = if is_json {
        serde_json::from_str(&file_content).with_context(|| format!("Invalid JSON definitions in {}", file_path.display()))?
    } else {
        serde_yaml::from_str(&file_content).with_context(|| format!("Invalid YAML definitions in {}", file_path.display()))?
    };

    definitions
        .validate()
        .map_err(|(subject, error)| anyhow::anyhow!("Invalid {subject} in {}: {error}", file_path.display()))?;

    debug!(
        adapter = %definitions.adapter,
        client_count = definitions.clients.options.len(),
        type_count = definitions.fetch.customizations.len(),
        "loaded definitions file"
    );
    Ok(definitions)
}

/// Builds one [`HarvestClient`] per configured client.
///
/// Header values are interpolated from the environment at this point.
pub fn build_http_clients(definitions: &ApiDefinitions) -> Result<HttpClients> {
    let mut clients = HttpClients::new();
    for (client_name, client_definition) in &definitions.clients.options {
        let base_url = client_definition
            .base_url
            .as_deref()
            .with_context(|| format!("Client '{client_name}' has no base_url"))?;
        let headers =
            interpolate_headers(&client_definition.headers).with_context(|| format!("Failed to resolve headers of client '{client_name}'"))?;
        let client = HarvestClient::new(client_name.clone(), base_url, &headers)
            .with_context(|| format!("Failed to build client '{client_name}'"))?;
        clients.insert(client_name.clone(), Arc::new(client) as Arc<dyn HttpClient>);
    }
    Ok(clients)
}
