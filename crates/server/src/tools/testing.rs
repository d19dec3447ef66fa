//! Transports and relay setup for tool tests.

use bytes::Bytes;
use courier_client::{FetchResponse, OutboundRequest, Relay, Transport, TransportError};
use courier_core::{AppConfig, Store};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Answers 200 with the request body echoed back, or fails while offline.
#[derive(Default)]
pub(crate) struct SwitchableTransport {
    offline: AtomicBool,
}

impl SwitchableTransport {
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Transport for SwitchableTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<FetchResponse, TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("offline".into()));
        }
        Ok(FetchResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: request.body.clone().unwrap_or_else(|| Bytes::from_static(b"ok")),
            fetch_ms: 1,
        })
    }
}

pub(crate) async fn relay() -> (Arc<Relay>, Arc<SwitchableTransport>) {
    let store = Store::open_in_memory().await.unwrap();
    let transport = Arc::new(SwitchableTransport::default());
    let relay = Relay::new(AppConfig::default(), store, transport.clone()).unwrap();
    relay.activate().await.unwrap();
    (Arc::new(relay), transport)
}
