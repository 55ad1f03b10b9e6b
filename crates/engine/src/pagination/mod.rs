//! Pagination traversal engine.
//!
//! For every context the traversal builds the first call by substituting the
//! context into the merged call arguments, then keeps asking the strategy for
//! the next call until it returns `None`. Pages of one context are fetched
//! strictly in sequence; contexts run concurrently. A context that leaves any
//! placeholder of the call unresolved is skipped without a call.

mod strategy;

use std::collections::HashSet;

use futures_util::future::try_join_all;
use harvest_api::HttpClient;
use harvest_types::{Context, HttpRequest, MergedEndpoint, Page};
use harvest_util::{
    build_path, collect_placeholders_from_value, extract_placeholders, lookup_arg, replace_args_in_headers, replace_args_in_value,
};
use indexmap::IndexSet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::merge::CallArgs;
use crate::model::PaginationStrategy;

/// Upper bound on pages fetched for one context.
pub const MAX_PAGES_PER_CONTEXT: usize = 10_000;

/// All pages fetched for one context, in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct PagesWithContext {
    pub context: Context,
    pub pages: Vec<Page>,
}

/// Traverses one merged endpoint with one client.
pub struct PageTraversal<'a> {
    pub client_name: &'a str,
    pub client: &'a dyn HttpClient,
    pub strategy: &'a PaginationStrategy,
    pub endpoint: &'a MergedEndpoint,
    pub call_args: &'a CallArgs,
}

impl PageTraversal<'_> {
    /// Traverses every context concurrently; the first transport error aborts the batch.
    pub async fn traverse(&self, contexts: &[Context]) -> Result<Vec<PagesWithContext>, FetchError> {
        debug!(
            client = %self.client_name,
            path = %self.endpoint.path,
            method = %self.endpoint.method,
            context_count = contexts.len(),
            "traversing pages"
        );
        try_join_all(contexts.iter().map(|context| self.traverse_context(context))).await
    }

    async fn traverse_context(&self, context: &Context) -> Result<PagesWithContext, FetchError> {
        let missing_args = self.missing_args(context);
        if !missing_args.is_empty() {
            warn!(
                client = %self.client_name,
                path = %self.endpoint.path,
                missing_args = ?missing_args,
                "context does not resolve every placeholder, skipping it"
            );
            return Ok(PagesWithContext {
                context: context.clone(),
                pages: Vec::new(),
            });
        }

        let mut request = self.strategy.first_request(self.initial_request(context));
        let mut issued = HashSet::new();
        let mut pages = Vec::new();

        loop {
            issued.insert(request.fingerprint());
            let page = self.client.execute(&request).await.map_err(|source| FetchError::Transport {
                client: self.client_name.to_string(),
                method: request.method,
                path: request.path.clone(),
                source,
            })?;
            let next_request = self.strategy.next_request(&page, &request);
            pages.push(page);

            let Some(next_request) = next_request else {
                break;
            };
            if issued.contains(&next_request.fingerprint()) {
                warn!(
                    client = %self.client_name,
                    path = %request.path,
                    page_count = pages.len(),
                    "pagination repeated an earlier request, stopping"
                );
                break;
            }
            if pages.len() >= MAX_PAGES_PER_CONTEXT {
                warn!(
                    client = %self.client_name,
                    path = %request.path,
                    page_count = pages.len(),
                    "pagination reached the page limit, stopping"
                );
                break;
            }
            request = next_request;
        }

        debug!(client = %self.client_name, path = %request.path, page_count = pages.len(), "context traversal finished");
        Ok(PagesWithContext {
            context: context.clone(),
            pages,
        })
    }

    /// Placeholder names in the call that `context` has no value for.
    fn missing_args(&self, context: &Context) -> Vec<String> {
        let mut referenced: IndexSet<String> = extract_placeholders(&self.endpoint.path).into_iter().collect();
        for value in self.call_args.query_args.values() {
            collect_placeholders_from_value(value, &mut referenced);
        }
        for value in self.call_args.headers.values() {
            referenced.extend(extract_placeholders(value));
        }
        if let Some(body) = &self.call_args.body {
            collect_placeholders_from_value(body, &mut referenced);
        }
        referenced.into_iter().filter(|name| lookup_arg(context, name).is_none()).collect()
    }

    fn initial_request(&self, context: &Context) -> HttpRequest {
        let query_args = match replace_args_in_value(&Value::Object(self.call_args.query_args.clone()), context) {
            Value::Object(query_args) => query_args,
            _ => self.call_args.query_args.clone(),
        };
        HttpRequest {
            method: self.endpoint.method,
            path: build_path(&self.endpoint.path, context),
            query_args,
            headers: replace_args_in_headers(&self.call_args.headers, context),
            body: self.call_args.body.as_ref().map(|body| replace_args_in_value(body, context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harvest_api::ClientError;
    use harvest_types::HttpMethod;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with scripted pages in order and records every request.
    struct ScriptedClient {
        pages: Mutex<Vec<Page>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedClient {
        fn new(pages: Vec<Value>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().rev().map(Page::from_data).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn execute(&self, request: &HttpRequest) -> Result<Page, ClientError> {
            self.requests.lock().expect("requests lock").push(request.clone());
            self.pages.lock().expect("pages lock").pop().ok_or_else(|| ClientError::Status {
                method: request.method,
                path: request.path.clone(),
                status: 404,
                body: "script exhausted".into(),
            })
        }
    }

    /// Never runs out of pages: every reply carries a fresh continuation token.
    #[derive(Default)]
    struct EndlessClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for EndlessClient {
        async fn execute(&self, _request: &HttpRequest) -> Result<Page, ClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Page::from_data(json!({ "items": [call], "next": format!("t{}", call + 1) })))
        }
    }

    fn endpoint(path: &str) -> MergedEndpoint {
        MergedEndpoint {
            path: path.into(),
            method: HttpMethod::Get,
            readonly: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn none_strategy_fetches_exactly_one_page() {
        let client = ScriptedClient::new(vec![json!({ "next": "ignored" }), json!({})]);
        let endpoint = endpoint("/items");
        let call_args = CallArgs::default();
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &PaginationStrategy::None,
            endpoint: &endpoint,
            call_args: &call_args,
        };

        let result = traversal.traverse(&[Context::new()]).await.expect("traversal succeeds");

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].pages.len(), 1);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn token_strategy_follows_tokens_until_null() {
        let client = ScriptedClient::new(vec![json!({ "next": "t1" }), json!({ "next": "t2" }), json!({ "next": null })]);
        let endpoint = endpoint("/items");
        let call_args = CallArgs::default();
        let strategy = PaginationStrategy::Token {
            token_field: "next".into(),
            param_name: "cursor".into(),
        };
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &strategy,
            endpoint: &endpoint,
            call_args: &call_args,
        };

        let result = traversal.traverse(&[Context::new()]).await.expect("traversal succeeds");

        assert_eq!(result[0].pages.len(), 3);
        let cursors: Vec<Option<Value>> = client
            .requests()
            .iter()
            .map(|request| request.query_args.get("cursor").cloned())
            .collect();
        assert_eq!(cursors, vec![None, Some(json!("t1")), Some(json!("t2"))]);
    }

    #[tokio::test]
    async fn repeated_continuation_ends_traversal() {
        let client = ScriptedClient::new(vec![json!({ "next": "same" }), json!({ "next": "same" }), json!({ "next": "other" })]);
        let endpoint = endpoint("/items");
        let call_args = CallArgs::default();
        let strategy = PaginationStrategy::Token {
            token_field: "next".into(),
            param_name: "cursor".into(),
        };
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &strategy,
            endpoint: &endpoint,
            call_args: &call_args,
        };

        let result = traversal.traverse(&[Context::new()]).await.expect("traversal succeeds");

        assert_eq!(result[0].pages.len(), 2);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn context_is_substituted_into_path_query_headers_and_body() {
        let client = ScriptedClient::new(vec![json!([])]);
        let endpoint = endpoint("/groups/{parent.id}/members");
        let call_args = CallArgs {
            query_args: json!({ "brand": "{brand}" }).as_object().cloned().expect("object"),
            headers: [("X-Parent".to_string(), "{parent.id}".to_string())].into_iter().collect(),
            body: Some(json!({ "ids": ["{parent.id}"] })),
        };
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &PaginationStrategy::None,
            endpoint: &endpoint,
            call_args: &call_args,
        };
        let context = json!({ "parent": { "id": 7 }, "brand": 3 }).as_object().cloned().expect("object");

        let result = traversal.traverse(std::slice::from_ref(&context)).await.expect("traversal succeeds");

        assert_eq!(result[0].context, context);
        let request = &client.requests()[0];
        assert_eq!(request.path, "/groups/7/members");
        assert_eq!(request.query_args.get("brand"), Some(&json!(3)));
        assert_eq!(request.headers.get("X-Parent").map(String::as_str), Some("7"));
        assert_eq!(request.body, Some(json!({ "ids": [7] })));
    }

    #[tokio::test]
    async fn contexts_missing_a_placeholder_value_are_skipped() {
        let client = ScriptedClient::new(vec![json!([{ "id": 1 }])]);
        let endpoint = endpoint("/groups/{parent.id}/members");
        let call_args = CallArgs {
            headers: [("X-Brand".to_string(), "{brand}".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &PaginationStrategy::None,
            endpoint: &endpoint,
            call_args: &call_args,
        };
        let without_id = json!({ "parent": { "name": "ops" }, "brand": 1 }).as_object().cloned().expect("object");
        let without_brand = json!({ "parent": { "id": 2 } }).as_object().cloned().expect("object");

        let result = traversal.traverse(&[without_id, without_brand]).await.expect("skipping is not an error");

        assert!(result.iter().all(|traversal| traversal.pages.is_empty()));
        assert!(client.requests().is_empty(), "no literal placeholder may be sent: {:?}", client.requests());
    }

    #[tokio::test]
    async fn transport_errors_abort_the_batch() {
        let client = ScriptedClient::new(vec![]);
        let endpoint = endpoint("/items");
        let call_args = CallArgs::default();
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &PaginationStrategy::None,
            endpoint: &endpoint,
            call_args: &call_args,
        };

        let error = traversal.traverse(&[Context::new()]).await.expect_err("script is empty");

        assert!(matches!(error, FetchError::Transport { ref client, .. } if client == "main"));
    }

    #[tokio::test]
    async fn endless_tokens_stop_at_the_page_limit() {
        let client = EndlessClient::default();
        let endpoint = endpoint("/items");
        let call_args = CallArgs::default();
        let strategy = PaginationStrategy::Token {
            token_field: "next".into(),
            param_name: "cursor".into(),
        };
        let traversal = PageTraversal {
            client_name: "main",
            client: &client,
            strategy: &strategy,
            endpoint: &endpoint,
            call_args: &call_args,
        };

        let result = traversal.traverse(&[Context::new()]).await.expect("page limit is not an error");

        assert_eq!(result[0].pages.len(), MAX_PAGES_PER_CONTEXT);
        assert_eq!(client.calls.load(Ordering::SeqCst), MAX_PAGES_PER_CONTEXT);
    }
}
