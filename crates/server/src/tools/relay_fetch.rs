//! relay_fetch tool implementation.
//!
//! Sends one request through the interception gateway, the same path an
//! intercepted page request takes.

use courier_client::{GatewayResponse, InterceptedRequest, Relay, ResponseSource};
use courier_core::Destination;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// A single request header.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderParam {
    pub name: String,
    pub value: String,
}

/// Input parameters for relay_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelayFetchParams {
    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Absolute URL, or a path relative to the backend origin.
    pub url: String,

    /// Request headers, replayed as given.
    #[serde(default)]
    pub headers: Vec<HeaderParam>,

    /// Destination hint such as "script", "style" or "image".
    #[serde(default)]
    pub destination: Option<String>,

    /// UTF-8 request body.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the relay_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelayFetchOutput {
    pub status: u16,
    /// "network", "cache" or "queued".
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbox_id: Option<i64>,
    pub headers: Vec<HeaderParam>,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
}

impl From<GatewayResponse> for RelayFetchOutput {
    fn from(response: GatewayResponse) -> Self {
        let (source, outbox_id) = match response.source {
            ResponseSource::Network => ("network", None),
            ResponseSource::Cache => ("cache", None),
            ResponseSource::Queued { outbox_id } => ("queued", Some(outbox_id)),
        };
        Self {
            status: response.status,
            source: source.to_string(),
            outbox_id,
            headers: response
                .headers
                .into_iter()
                .map(|(name, value)| HeaderParam { name, value })
                .collect(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
    }
}

fn to_request(params: RelayFetchParams) -> Result<InterceptedRequest, ToolError> {
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method must not be empty".into()));
    }

    let mut request = InterceptedRequest::new(params.method.trim(), params.url);
    for header in params.headers {
        if header.name.trim().is_empty() {
            return Err(ToolError::InvalidInput("header name must not be empty".into()));
        }
        request = request.with_header(header.name, header.value);
    }
    if let Some(hint) = params.destination.as_deref() {
        request = request.with_destination(Destination::from_hint(hint));
    }
    if let Some(body) = params.body {
        request.body = Some(body.into());
    }
    Ok(request)
}

/// Implementation of the relay_fetch tool.
pub async fn fetch_impl(relay: &Relay, params: RelayFetchParams) -> Result<CallToolResult, McpError> {
    let request = to_request(params)?;

    let response = relay.intercept(request).await?;
    json_result(&RelayFetchOutput::from(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{result_json, testing};

    fn params(method: &str, url: &str, body: Option<&str>) -> RelayFetchParams {
        RelayFetchParams {
            method: method.to_string(),
            url: url.to_string(),
            headers: vec![HeaderParam { name: "content-type".into(), value: "application/json".into() }],
            destination: None,
            body: body.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_fetch_online_write_is_delivered() {
        let (relay, _) = testing::relay().await;
        let result = fetch_impl(&relay, params("POST", "/api/chat/messages", Some(r#"{"text":"hi"}"#)))
            .await
            .unwrap();

        let output = result_json(&result);
        assert_eq!(output["status"], 200);
        assert_eq!(output["source"], "network");
        assert_eq!(output["body"], r#"{"text":"hi"}"#);
        assert_eq!(relay.store().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_offline_write_is_queued() {
        let (relay, transport) = testing::relay().await;
        transport.set_offline(true);

        let result = fetch_impl(&relay, params("POST", "/api/chat/messages", Some("{}")))
            .await
            .unwrap();

        let output = result_json(&result);
        assert_eq!(output["status"], 202);
        assert_eq!(output["source"], "queued");
        assert_eq!(output["outbox_id"], 1);
    }

    #[tokio::test]
    async fn test_fetch_offline_read_fails() {
        let (relay, transport) = testing::relay().await;
        transport.set_offline(true);

        let result = fetch_impl(&relay, params("GET", "/api/orders", None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_static_asset_served_from_cache() {
        let (relay, _) = testing::relay().await;
        let asset = || params("GET", "/static/app.js", None);

        let first = result_json(&fetch_impl(&relay, asset()).await.unwrap());
        assert_eq!(first["source"], "network");

        let second = result_json(&fetch_impl(&relay, asset()).await.unwrap());
        assert_eq!(second["source"], "cache");
        assert_eq!(second["body"], "ok");
    }

    #[tokio::test]
    async fn test_fetch_destination_hint_caches_outside_static_prefix() {
        let (relay, _) = testing::relay().await;
        let logo = || RelayFetchParams { destination: Some("image".into()), ..params("GET", "/logo.png", None) };

        assert_eq!(result_json(&fetch_impl(&relay, logo()).await.unwrap())["source"], "network");
        assert_eq!(result_json(&fetch_impl(&relay, logo()).await.unwrap())["source"], "cache");
    }

    #[tokio::test]
    async fn test_fetch_rejects_blank_header_name() {
        let (relay, _) = testing::relay().await;
        let mut bad = params("GET", "/", None);
        bad.headers.push(HeaderParam { name: " ".into(), value: "x".into() });

        let err = fetch_impl(&relay, bad).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
