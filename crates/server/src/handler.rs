//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the shared relay.
use crate::tools::{
    OutboxListParams, RelayFetchParams, RelayFlushParams, connectivity_impl, fetch_impl, flush_impl, generations_impl,
    list_impl,
};

use courier_client::Relay;
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
use std::sync::Arc;

/// The MCP server handler for courier.
#[derive(Clone)]
pub struct CourierServer {
    relay: Arc<Relay>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl CourierServer {
    /// Create a new server handler around an activated relay.
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Send a request through the relay. Static assets use the response cache; writes to the durable endpoint are queued when the backend is unreachable."
    )]
    async fn relay_fetch(&self, params: Parameters<RelayFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.relay, params.0).await
    }

    #[tool(description = "Flush the outbox in order. Only runs when the tag matches the configured flush tag.")]
    async fn relay_flush(&self, params: Parameters<RelayFlushParams>) -> Result<CallToolResult, McpError> {
        flush_impl(&self.relay, params.0).await
    }

    #[tool(description = "Signal that connectivity is back and flush the outbox.")]
    async fn relay_connectivity_restored(&self) -> Result<CallToolResult, McpError> {
        connectivity_impl(&self.relay).await
    }

    #[tool(description = "List pending outbox entries, oldest first. Header values are not shown.")]
    async fn outbox_list(&self, params: Parameters<OutboxListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.relay, params.0).await
    }

    #[tool(description = "Show the current cache generation, stored generations and relay state.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.relay).await
    }
}

impl ServerHandler for CourierServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "courier".into(),
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
