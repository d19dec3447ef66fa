//! relay_flush and relay_connectivity_restored tool implementations.
//!
//! Both run one outbox flush pass. The explicit flush only runs when its tag
//! matches the configured flush tag.

use courier_client::{FlushOutcome, Relay, Trigger, TriggerOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the relay_flush tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelayFlushParams {
    /// Message tag. Must equal the configured flush tag.
    pub tag: String,
}

/// Output from the flush tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FlushOutput {
    /// "completed", "skipped" (a flush was already running) or "ignored".
    pub status: String,
    pub delivered: Vec<i64>,
    pub remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
}

impl FlushOutput {
    fn status(status: &str) -> Self {
        Self { status: status.to_string(), ..Default::default() }
    }
}

fn to_output(outcome: TriggerOutcome) -> FlushOutput {
    match outcome {
        TriggerOutcome::Flush(FlushOutcome::Completed(report)) => FlushOutput {
            status: "completed".to_string(),
            delivered: report.delivered,
            remaining: report.remaining,
            halted_at: report.halted.as_ref().map(|h| h.id),
            halt_reason: report.halted.map(|h| h.reason),
        },
        TriggerOutcome::Flush(FlushOutcome::Skipped) => FlushOutput::status("skipped"),
        _ => FlushOutput::status("ignored"),
    }
}

/// Implementation of the relay_flush tool.
pub async fn flush_impl(relay: &Relay, params: RelayFlushParams) -> Result<CallToolResult, McpError> {
    let outcome = relay.dispatch(Trigger::ExplicitFlush { tag: params.tag }).await?;
    json_result(&to_output(outcome))
}

/// Implementation of the relay_connectivity_restored tool.
pub async fn connectivity_impl(relay: &Relay) -> Result<CallToolResult, McpError> {
    let outcome = relay.dispatch(Trigger::ConnectivityRestored).await?;
    json_result(&to_output(outcome))
}
