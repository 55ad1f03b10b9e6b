//! Requester façade: merge, expand arguments, traverse, extract, validate.

use std::sync::Arc;

use futures_util::future::try_join_all;
use harvest_api::HttpClient;
use harvest_types::{Context, PossibleArgs, RequestDefinition, ResourceIdentifier, ValueGeneratedItem};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::arguments::{compute_arg_combinations, find_unresolved_args, relevant_arg_roots};
use crate::definitions::DefinitionsSource;
use crate::error::FetchError;
use crate::extract::{ItemExtractor, validate_items};
use crate::merge::{MergedRequest, merge_request_definition};
use crate::pagination::PageTraversal;

/// HTTP clients keyed by the client names used in the definitions.
pub type HttpClients = IndexMap<String, Arc<dyn HttpClient>>;

/// Entry point of the fetch engine.
///
/// Holds the definition registry and the HTTP clients; both are shared
/// read-only, so one requester can serve concurrent fetches.
#[derive(Clone)]
pub struct Requester {
    definitions: Arc<dyn DefinitionsSource>,
    clients: HttpClients,
}

impl Requester {
    pub fn new(definitions: Arc<dyn DefinitionsSource>, clients: HttpClients) -> Self {
        Self { definitions, clients }
    }

    /// Fetches one request definition for the given contexts.
    ///
    /// Each returned item carries the context its page was fetched for; the
    /// definition's static context is only visible to the transformation.
    pub async fn request(
        &self,
        request_definition: &RequestDefinition,
        contexts: &[Context],
        type_name: &str,
    ) -> Result<Vec<ValueGeneratedItem>, FetchError> {
        let merged = merge_request_definition(self.definitions.as_ref(), request_definition)?;
        self.request_merged(&merged, request_definition, contexts, type_name).await
    }

    /// Fetches every request definition registered for `resource.type_name`.
    ///
    /// All definitions are merged before the first call so configuration
    /// errors surface without any network traffic. Each definition gets the
    /// argument combinations of the roots it references; results are
    /// concatenated in definition order.
    pub async fn request_all_for_resource(
        &self,
        possible_args: &PossibleArgs,
        resource: &ResourceIdentifier,
    ) -> Result<Vec<ValueGeneratedItem>, FetchError> {
        let request_definitions = self.definitions.query_request_definitions(&resource.type_name)?;
        let merged_requests = request_definitions
            .iter()
            .map(|request_definition| merge_request_definition(self.definitions.as_ref(), request_definition))
            .collect::<Result<Vec<_>, _>>()?;
        for merged in &merged_requests {
            self.client_for(merged)?;
        }

        info!(
            adapter = %self.definitions.adapter_name(),
            type_name = %resource.type_name,
            definition_count = request_definitions.len(),
            "fetching resource"
        );

        let fetches = request_definitions.iter().zip(&merged_requests).map(|(request_definition, merged)| async move {
            let unresolved_args = find_unresolved_args(&merged.endpoint);
            let roots = relevant_arg_roots(&unresolved_args);
            let contexts = compute_arg_combinations(possible_args, &roots);
            debug!(
                type_name = %resource.type_name,
                path = %merged.endpoint.path,
                roots = ?roots,
                context_count = contexts.len(),
                "computed argument combinations"
            );
            self.request_merged(merged, request_definition, &contexts, &resource.type_name).await
        });

        let items: Vec<ValueGeneratedItem> = try_join_all(fetches).await?.into_iter().flatten().collect();
        info!(
            adapter = %self.definitions.adapter_name(),
            type_name = %resource.type_name,
            item_count = items.len(),
            "fetched resource"
        );
        Ok(items)
    }

    async fn request_merged(
        &self,
        merged: &MergedRequest,
        request_definition: &RequestDefinition,
        contexts: &[Context],
        type_name: &str,
    ) -> Result<Vec<ValueGeneratedItem>, FetchError> {
        let client = self.client_for(merged)?;
        let traversal = PageTraversal {
            client_name: &merged.client_name,
            client: client.as_ref(),
            strategy: &merged.pagination.strategy,
            endpoint: &merged.endpoint,
            call_args: &merged.call_args,
        };
        let pages_with_context = traversal.traverse(contexts).await?;

        let extractor = ItemExtractor::new(request_definition, type_name);
        Ok(validate_items(
            extractor.extract(&pages_with_context),
            &merged.client_name,
            &merged.endpoint.path,
            merged.endpoint.method,
        ))
    }

    fn client_for(&self, merged: &MergedRequest) -> Result<&Arc<dyn HttpClient>, FetchError> {
        self.clients
            .get(&merged.client_name)
            .ok_or_else(|| FetchError::UnknownClient {
                client: merged.client_name.clone(),
            })
    }
}
