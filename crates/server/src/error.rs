//! Structured errors for tool parameter handling.
//!
//! Relay and store failures convert through `courier_core::Error`.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised while turning tool parameters into relay calls.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., malformed header).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("OUTPUT_FAILED: {0}")]
    Output(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Output(err.to_string())
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::Output(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
