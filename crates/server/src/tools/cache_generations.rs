//! cache_generations tool implementation.
//!
//! Reports the current cache generation, every generation present in the
//! store and the relay lifecycle state.

use courier_client::{LifecycleState, Relay};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    pub current: String,
    pub stored: Vec<String>,
    /// "uninitialized", "purging" or "ready".
    pub state: String,
}

fn state_name(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Uninitialized => "uninitialized",
        LifecycleState::Purging => "purging",
        LifecycleState::Ready => "ready",
    }
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(relay: &Relay) -> Result<CallToolResult, McpError> {
    let stored = relay.store().list_generations().await?;
    let output = CacheGenerationsOutput {
        current: relay.config().cache_version.clone(),
        stored,
        state: state_name(relay.state().await).to_string(),
    };
    json_result(&output)
}
