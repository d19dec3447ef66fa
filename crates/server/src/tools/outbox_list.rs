//! outbox_list tool implementation.
//!
//! Lists pending writes in delivery order. Header values are never shown
//! since they usually carry credentials.

use courier_core::QueuedEntry;
use courier_client::Relay;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the outbox_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OutboxListParams {
    /// Return at most this many entries (oldest first).
    #[serde(default)]
    pub limit: Option<usize>,

    /// Include the payload decoded as UTF-8.
    #[serde(default)]
    pub include_payload: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutboxEntryOutput {
    pub id: i64,
    pub enqueued_at: String,
    pub bytes: usize,
    pub header_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Output from the outbox_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutboxListOutput {
    pub pending: u64,
    pub entries: Vec<OutboxEntryOutput>,
}

fn entry_output(entry: QueuedEntry, include_payload: bool) -> OutboxEntryOutput {
    OutboxEntryOutput {
        id: entry.id,
        enqueued_at: entry.enqueued_at,
        bytes: entry.payload.len(),
        header_names: entry.headers.into_iter().map(|(name, _)| name).collect(),
        payload: include_payload.then(|| String::from_utf8_lossy(&entry.payload).into_owned()),
    }
}

/// Implementation of the outbox_list tool.
pub async fn list_impl(relay: &Relay, params: OutboxListParams) -> Result<CallToolResult, McpError> {
    let entries = relay.store().list_pending().await?;
    let pending = entries.len() as u64;
    let limit = params.limit.unwrap_or(usize::MAX);

    let output = OutboxListOutput {
        pending,
        entries: entries
            .into_iter()
            .take(limit)
            .map(|e| entry_output(e, params.include_payload))
            .collect(),
    };
    json_result(&output)
}
