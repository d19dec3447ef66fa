//! Interception gateway.
//!
//! Every request passes through [`Gateway::handle`]:
//!
//! - `Bypass`: straight to the network, response or failure returned as is.
//! - `CacheStrategy`: stale-while-revalidate. A cached record is returned
//!   immediately while a background fetch refreshes it. On a miss the caller
//!   waits for the fetch, which populates the cache before answering.
//! - `QueueOnFailure`: delivered directly when possible. Only a transport
//!   failure sends the body to the outbox, and the caller gets a synthetic
//!   `202` marked as queued. Backend rejections come back untouched.

use bytes::Bytes;
use courier_core::store::hash::compute_cache_key;
use courier_core::{
    AppConfig, CacheRecord, ClassifierRules, Destination, Disposition, Error, RequestDescriptor, Store, classify,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::fetch::{FetchResponse, OutboundRequest, Transport, TransportError, content_type_of, resolve};

/// Header set on synthetic queued responses.
pub const QUEUED_HEADER: &str = "x-courier-queued";

/// Status of a synthetic queued response.
pub const QUEUED_STATUS: u16 = 202;

/// Headers that belong to one connection and are never stored or replayed.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-connection",
];

/// A request as the host hands it over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    /// Absolute, or relative to the backend origin.
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Destination hint. Falls back to the `sec-fetch-dest` header.
    pub destination: Option<Destination>,
    pub body: Option<Bytes>,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into(), url: url.into(), ..Default::default() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { body: Some(body.into()), ..Self::new("POST", url) }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn effective_destination(&self) -> Option<Destination> {
        self.destination
            .clone()
            .or_else(|| self.header("sec-fetch-dest").map(Destination::from_hint))
    }
}

/// Where a gateway response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseSource {
    /// Fresh from the backend.
    Network,
    /// Served from the response cache.
    Cache,
    /// Not delivered yet; waiting in the outbox.
    Queued { outbox_id: i64 },
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl GatewayResponse {
    fn from_fetch(response: FetchResponse) -> Self {
        Self { status: response.status, headers: response.headers, body: response.body, source: ResponseSource::Network }
    }

    fn from_record(record: CacheRecord) -> Self {
        Self {
            status: record.status_code,
            headers: record.headers,
            body: Bytes::from(record.body),
            source: ResponseSource::Cache,
        }
    }

    /// Accepted-for-later-delivery marker.
    pub fn queued(outbox_id: i64) -> Self {
        let body = serde_json::json!({ "queued": true, "outbox_id": outbox_id }).to_string();
        Self {
            status: QUEUED_STATUS,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                (QUEUED_HEADER.to_string(), "true".to_string()),
            ],
            body: Bytes::from(body),
            source: ResponseSource::Queued { outbox_id },
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self.source, ResponseSource::Queued { .. })
    }
}

/// Best-effort writer for one cache generation.
#[derive(Clone)]
struct CacheWriter {
    store: Store,
    generation: String,
    max_bytes: usize,
}

impl CacheWriter {
    /// Store a successful response. Oversized bodies are skipped.
    async fn populate(&self, request: &OutboundRequest, key: &str, response: &FetchResponse) -> Result<(), Error> {
        if response.body.len() > self.max_bytes {
            tracing::debug!(url = %request.url, bytes = response.body.len(), "response too large to cache");
            return Ok(());
        }

        let record = CacheRecord {
            key: key.to_string(),
            method: request.method.to_ascii_uppercase(),
            url: request.url.to_string(),
            status_code: response.status,
            content_type: content_type_of(&response.headers),
            headers: strip_hop_by_hop(&response.headers),
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.populate(&self.generation, &record).await
    }
}

/// Fetch from the network and refresh the cache on success.
async fn revalidate(
    transport: Arc<dyn Transport>, writer: CacheWriter, request: OutboundRequest, key: String,
) -> Result<FetchResponse, Error> {
    let response = transport.send(&request).await.map_err(Error::from)?;

    if response.status == 200
        && let Err(e) = writer.populate(&request, &key, &response).await
    {
        tracing::warn!(url = %request.url, error = %e, "cache populate failed");
    }

    Ok(response)
}

fn strip_hop_by_hop(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(k, _)| !HOP_BY_HOP.iter().any(|h| k.eq_ignore_ascii_case(h)))
        .cloned()
        .collect()
}

/// The single chokepoint for intercepted requests.
pub struct Gateway {
    store: Store,
    transport: Arc<dyn Transport>,
    base_url: Url,
    rules: ClassifierRules,
    cache_version: String,
    max_cache_bytes: usize,
}

impl Gateway {
    pub fn new(config: &AppConfig, store: Store, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let base_url = Url::parse(&config.backend_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            store,
            transport,
            base_url,
            rules: config.classifier_rules(),
            cache_version: config.cache_version.clone(),
            max_cache_bytes: config.max_cache_bytes,
        })
    }

    /// Classify a request against the configured routing rules.
    pub fn classify(&self, request: &InterceptedRequest) -> Result<Disposition, Error> {
        let url = resolve(&self.base_url, &request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let destination = request.effective_destination();
        let descriptor = RequestDescriptor {
            method: &request.method,
            path: url.path(),
            accept: request.header("accept"),
            destination: destination.as_ref(),
        };
        Ok(classify(&self.rules, &descriptor))
    }

    /// Classify and dispatch.
    pub async fn handle(&self, request: InterceptedRequest) -> Result<GatewayResponse, Error> {
        let disposition = self.classify(&request)?;
        self.dispatch(request, disposition).await
    }

    /// Dispatch with an already decided disposition.
    pub async fn dispatch(
        &self, request: InterceptedRequest, disposition: Disposition,
    ) -> Result<GatewayResponse, Error> {
        let outbound = self.outbound(request)?;
        tracing::debug!(method = %outbound.method, url = %outbound.url, ?disposition, "intercepted");

        match disposition {
            Disposition::Bypass => self.pass_through(outbound).await,
            Disposition::CacheStrategy => self.stale_while_revalidate(outbound).await,
            Disposition::QueueOnFailure => self.deliver_or_enqueue(outbound).await,
        }
    }

    fn outbound(&self, request: InterceptedRequest) -> Result<OutboundRequest, Error> {
        let url = resolve(&self.base_url, &request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(OutboundRequest {
            method: request.method.to_ascii_uppercase(),
            url,
            headers: strip_hop_by_hop(&request.headers),
            body: request.body,
        })
    }

    fn writer(&self) -> CacheWriter {
        CacheWriter { store: self.store.clone(), generation: self.cache_version.clone(), max_bytes: self.max_cache_bytes }
    }

    async fn pass_through(&self, outbound: OutboundRequest) -> Result<GatewayResponse, Error> {
        let response = self.transport.send(&outbound).await?;
        Ok(GatewayResponse::from_fetch(response))
    }

    async fn stale_while_revalidate(&self, outbound: OutboundRequest) -> Result<GatewayResponse, Error> {
        let key = compute_cache_key(&outbound.method, outbound.url.as_str());

        let cached = match self.store.lookup(&self.cache_version, &key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(url = %outbound.url, error = %e, "cache lookup failed, going to network");
                None
            }
        };

        let url = outbound.url.clone();
        let refresh = revalidate(Arc::clone(&self.transport), self.writer(), outbound, key);

        if let Some(record) = cached {
            tracing::debug!(url = %url, "cache hit, revalidating in background");
            tokio::spawn(async move {
                if let Err(e) = refresh.await {
                    tracing::warn!(url = %url, error = %e, "background revalidation failed");
                }
            });
            return Ok(GatewayResponse::from_record(record));
        }

        refresh.await.map(GatewayResponse::from_fetch)
    }

    async fn deliver_or_enqueue(&self, outbound: OutboundRequest) -> Result<GatewayResponse, Error> {
        let err = match self.transport.send(&outbound).await {
            Ok(response) => return Ok(GatewayResponse::from_fetch(response)),
            Err(TransportError::Incomplete { status, headers, .. }) if (200..300).contains(&status) => {
                tracing::warn!(url = %outbound.url, status, "write acknowledged, response body lost");
                return Ok(GatewayResponse { status, headers, body: Bytes::new(), source: ResponseSource::Network });
            }
            Err(e) => Error::from(e),
        };

        if !err.is_transport() {
            return Err(err);
        }

        let payload = outbound.body.clone().unwrap_or_default();
        let id = self.store.enqueue(&payload, &outbound.headers).await.map_err(|e| {
            tracing::error!(url = %outbound.url, error = %e, "outbox enqueue failed, write not delivered");
            e
        })?;

        tracing::info!(outbox_id = id, url = %outbound.url, reason = %err, "write queued for later delivery");
        Ok(GatewayResponse::queued(id))
    }
}
