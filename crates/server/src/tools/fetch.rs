//! cache_fetch tool implementation.
//!
//! Runs one request through the offline cache exactly as an intercepted
//! page request would be handled.

use std::collections::BTreeMap;

use orc_client::{OfflineCache, fetch::canonicalize};
use orc_core::{Destination, Request, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::json_result;
use crate::error::ToolError;

/// Parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are ever cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// What the response is for. Inferred from the URL when omitted.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Treat the request as a top-level page load.
    #[serde(default)]
    pub navigate: bool,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheFetchOutput {
    pub url: String,
    /// Route that classified the request.
    pub route: String,
    /// Store the route reads and writes, empty for network-only routes.
    pub store: String,
    pub status: u16,
    pub source: ResponseSource,
    /// True when the answer is an offline stand-in.
    pub degraded: bool,
    /// True when a background refresh was started.
    pub revalidating: bool,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub body_bytes: usize,
}

fn build_request(cache: &OfflineCache, params: CacheFetchParams) -> Result<Request, ToolError> {
    let origin = Url::parse(&cache.config().origin).map_err(|e| ToolError::InvalidInput(format!("origin: {e}")))?;
    let url = canonicalize(&params.url, Some(&origin)).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let method = params.method.trim().to_ascii_uppercase();
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidInput(format!("invalid method: {}", params.method)));
    }

    let mut request = if params.navigate { Request::navigate(url) } else { Request::get(url) };
    request.method = method;
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }
    Ok(params
        .headers
        .into_iter()
        .fold(request, |request, (name, value)| request.with_header(name, value)))
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(cache: &OfflineCache, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(cache, params)?;
    let route = cache.router().classify(&request);
    let (route_name, store) = (route.name.clone(), route.target.store.clone());

    let handled = cache.fetch(request.clone()).await?;
    let response = handled.response;

    let output = CacheFetchOutput {
        url: request.url.to_string(),
        route: route_name,
        store,
        status: response.status,
        source: response.source,
        degraded: response.source.is_degraded(),
        revalidating: handled.revalidation.is_some(),
        content_type: response.content_type().map(str::to_string),
        body: response.text(),
        body_bytes: response.body.len(),
        headers: response.headers,
    };

    json_result(&output)
}
