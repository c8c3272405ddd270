//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the offline worker.
use std::sync::Arc;

use crate::tools::asset_fetch::{AssetFetchParams, fetch_impl};
use crate::tools::cache::{CacheGetParams, CacheMessageParams, get_impl, message_impl, status_impl};

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
use trailcache_client::OfflineWorker;

/// The main MCP server handler for trailcache.
#[derive(Clone)]
pub struct TrailCacheServer {
    worker: Arc<OfflineWorker>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl TrailCacheServer {
    /// Create a new server handler around a registered worker.
    pub fn new(worker: Arc<OfflineWorker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    /// Fetch an asset through the offline worker.
    ///
    /// Same-origin GETs are answered cache-first, cross-origin GETs
    /// network-first; everything else goes straight to the network.
    #[tool(
        description = "Fetch a URL through the offline cache. Reports status, headers, body digest and whether the response came from cache, network or passthrough."
    )]
    async fn asset_fetch(&self, params: Parameters<AssetFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Post a control message to the cache worker: SKIP_WAITING or CLEAR_CACHE.")]
    async fn cache_message(&self, params: Parameters<CacheMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Show the worker lifecycle state, cache generations and entry counts.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "Look up a cached asset in the active generation without using the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for TrailCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "trailcache".into(),
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
