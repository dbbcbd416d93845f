//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{CachePurgeParams, CacheStoresParams, purge_impl, stores_impl},
    fetch::{CacheFetchParams, fetch_impl},
    lifecycle::{CacheActivateParams, activate_impl, install_impl},
    push::push_impl,
};
use orc_client::{OfflineCache, PushPayload};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler for the offline request cache.
#[derive(Clone)]
pub struct OrcServer {
    cache: Arc<OfflineCache>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OrcServer {
    pub fn new(cache: Arc<OfflineCache>) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch a URL through the offline cache. Classifies the request, applies the route's caching strategy and reports where the response came from (network, cache, offline-document, offline-synthesized)."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.cache, params.0).await
    }

    #[tool(
        description = "Install the configured version: precache the manifest into the main store and the offline document into the offline store. Failed assets are reported, not fatal."
    )]
    async fn cache_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.cache).await
    }

    #[tool(description = "Activate the configured version, deleting every store not on the allow-list.")]
    async fn cache_activate(&self, params: Parameters<CacheActivateParams>) -> Result<CallToolResult, McpError> {
        activate_impl(&self.cache, params.0).await
    }

    #[tool(description = "List stores with entry counts and sizes, the installed and active versions, and the allow-list.")]
    async fn cache_stores(&self, params: Parameters<CacheStoresParams>) -> Result<CallToolResult, McpError> {
        stores_impl(&self.cache, params.0).await
    }

    #[tool(description = "Delete a store, or a single URL from a store.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }

    #[tool(description = "Deliver a push message {title, body}; shows a notification with the configured icon.")]
    async fn cache_push(&self, params: Parameters<PushPayload>) -> Result<CallToolResult, McpError> {
        push_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for OrcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "orc-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
