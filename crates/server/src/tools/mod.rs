//! MCP tool implementations.
//!
//! Every tool drives the shared [`courier_client::Relay`].

pub mod cache_generations;
pub mod outbox_list;
pub mod relay_fetch;
pub mod relay_flush;

#[cfg(test)]
pub(crate) mod testing;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use cache_generations::generations_impl;
pub use outbox_list::{OutboxListParams, list_impl};
pub use relay_fetch::{RelayFetchParams, fetch_impl};
pub use relay_flush::{RelayFlushParams, connectivity_impl, flush_impl};

/// Pretty-printed JSON as a single text content block.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
