//! HTTP client collaborator for the fetch engine.
//!
//! This crate provides:
//!
//! - The [`HttpClient`] trait the engine calls for every page
//! - [`HarvestClient`], a `reqwest`-backed implementation with a validated
//!   base URL and default headers
//! - [`ClientError`], the transport error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use harvest_api::{HarvestClient, HttpClient};
//! use harvest_types::HttpRequest;
//! use indexmap::IndexMap;
//!
//! async fn run() -> Result<(), harvest_api::ClientError> {
//!     let client = HarvestClient::new("main", "https://example.zendesk.com", &IndexMap::new())?;
//!     let page = client.execute(&HttpRequest { path: "/api/v2/tickets".into(), ..Default::default() }).await?;
//!     println!("status: {}", page.status);
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use harvest_types::{HttpMethod, HttpRequest, Page};
use harvest_util::{JsonParseError, parse_response_json_strict, redact_sensitive, status_error_message, truncate_response_preview};
use indexmap::IndexMap;
use reqwest::{Client, Method, RequestBuilder, header};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Hostnames allowed to use plain `http` for local development.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];
/// Upper bound on a single HTTP call, including reading the body.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes one HTTP call and returns the parsed page.
///
/// Implementations own retries, rate limiting and timeouts; the fetch engine
/// propagates any error unchanged.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<Page, ClientError>;
}

/// Errors raised while building a client or executing a call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid base URL '{base_url}': {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Could not build the HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Network error calling {method} {path}: {source}. Hint: check connection/proxy and base URL configuration.")]
    Network {
        method: HttpMethod,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {method} {path}: {body}")]
    Status {
        method: HttpMethod,
        path: String,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Json(#[from] JsonParseError),
}

/// Thin wrapper around a configured `reqwest::Client` for one named client.
#[derive(Debug, Clone)]
pub struct HarvestClient {
    pub name: String,
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl HarvestClient {
    /// Builds a client for `base_url` sending `headers` with every request.
    pub fn new(name: impl Into<String>, base_url: &str, headers: &IndexMap<String, String>) -> Result<Self, ClientError> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let header_name = header::HeaderName::from_bytes(name.as_bytes()).map_err(|error| ClientError::InvalidHeader {
                name: name.clone(),
                reason: error.to_string(),
            })?;
            let header_value = header::HeaderValue::from_str(value).map_err(|error| ClientError::InvalidHeader {
                name: name.clone(),
                reason: error.to_string(),
            })?;
            default_headers.insert(header_name, header_value);
        }

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("harvest/0.1; {}", env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(client = %self.name, %url, "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }
}

#[async_trait]
impl HttpClient for HarvestClient {
    async fn execute(&self, request: &HttpRequest) -> Result<Page, ClientError> {
        let start = Instant::now();
        debug!(
            client = %self.name,
            method = %request.method,
            path = %request.path,
            query_arg_count = request.query_args.len(),
            has_body = request.body.is_some(),
            "http request started"
        );

        let mut request_builder = self.request(to_reqwest_method(request.method), &request.path);
        if !request.query_args.is_empty() {
            request_builder = request_builder.query(&build_query_pairs(&request.query_args));
        }
        for (name, value) in &request.headers {
            request_builder = request_builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            request_builder = request_builder.json(body);
        }

        let response = request_builder.send().await.map_err(|source| {
            warn!(client = %self.name, method = %request.method, path = %request.path, error = %source, "http request failed");
            ClientError::Network {
                method: request.method,
                path: request.path.clone(),
                source,
            }
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_ascii_lowercase(), value.to_string())))
            .collect::<IndexMap<_, _>>();
        let body_text = response.text().await.map_err(|source| ClientError::Network {
            method: request.method,
            path: request.path.clone(),
            source,
        })?;

        if !status.is_success() {
            warn!(
                client = %self.name,
                method = %request.method,
                path = %request.path,
                status = %status,
                duration_ms = start.elapsed().as_millis(),
                "http request returned failure status"
            );
            let preview = truncate_response_preview(&redact_sensitive(&body_text), 200);
            let body = match status_error_message(status.as_u16()) {
                Some(hint) => format!("{hint}. {preview}"),
                None => preview,
            };
            return Err(ClientError::Status {
                method: request.method,
                path: request.path.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let data = parse_response_json_strict(&body_text, Some(status)).inspect_err(|error| {
            warn!(
                client = %self.name,
                method = %request.method,
                path = %request.path,
                status = %status,
                body_len = body_text.len(),
                error = %error,
                "http response JSON parse failed"
            );
        })?;
        debug!(
            client = %self.name,
            method = %request.method,
            path = %request.path,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "http request completed"
        );

        Ok(Page {
            data,
            headers,
            status: status.as_u16(),
        })
    }
}

pub fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Flattens query arguments into pairs; arrays repeat their key.
fn build_query_pairs(query_args: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query_args {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), query_value_to_string(item)));
                }
            }
            Value::Null => {}
            other => pairs.push((key.clone(), query_value_to_string(other))),
        }
    }
    pairs
}

fn query_value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: `http` or `https`
/// - otherwise: scheme must be `https`
fn validate_base_url(base: &str) -> Result<(), ClientError> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        base_url: base.to_string(),
        reason,
    };
    let parsed_base_url = Url::parse(base).map_err(|error| invalid(error.to_string()))?;
    let host_name = parsed_base_url.host_str().ok_or_else(|| invalid("a host is required".into()))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return match parsed_base_url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(format!("unsupported scheme '{other}://'"))),
        };
    }

    if parsed_base_url.scheme() != "https" {
        return Err(invalid(format!(
            "must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        )));
    }

    Ok(())
}
