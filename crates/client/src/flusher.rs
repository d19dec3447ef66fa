//! Delivery flusher.
//!
//! Drains the outbox in id order. Each entry is removed only after the backend
//! acknowledges it with a 2xx; the first failure ends the pass and leaves that
//! entry and everything after it pending for the next trigger. There is no
//! retry timer here.

use bytes::Bytes;
use courier_core::{AppConfig, Error, QueuedEntry, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use crate::fetch::{OutboundRequest, Transport, resolve};

/// The entry a flush stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Halt {
    pub id: i64,
    pub reason: String,
}

/// Result of one flush pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Ids delivered and removed, in delivery order.
    pub delivered: Vec<i64>,
    /// Entries still pending after the pass.
    pub remaining: u64,
    pub halted: Option<Halt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlushOutcome {
    Completed(FlushReport),
    /// Another flush was already running.
    Skipped,
}

pub struct Flusher {
    store: Store,
    transport: Arc<dyn Transport>,
    endpoint: Url,
    running: Mutex<()>,
}

impl Flusher {
    pub fn new(config: &AppConfig, store: Store, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let base = Url::parse(&config.backend_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let endpoint = resolve(&base, &config.durable_write_path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { store, transport, endpoint, running: Mutex::new(()) })
    }

    /// Run one flush pass unless one is already in progress.
    ///
    /// Storage failures surface as errors. Delivery failures do not: they end
    /// the pass and show up in [`FlushReport::halted`].
    pub async fn flush(&self) -> Result<FlushOutcome, Error> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!("flush already in progress, trigger ignored");
            return Ok(FlushOutcome::Skipped);
        };

        let pending = self.store.list_pending().await?;
        let mut report = FlushReport::default();

        for entry in &pending {
            if let Err(reason) = self.deliver(entry).await {
                tracing::info!(outbox_id = entry.id, %reason, "flush halted");
                report.halted = Some(Halt { id: entry.id, reason });
                break;
            }

            if let Err(e) = self.store.remove(entry.id).await {
                tracing::warn!(outbox_id = entry.id, error = %e, "delivered entry could not be removed");
                return Err(e);
            }

            tracing::debug!(outbox_id = entry.id, "delivered");
            report.delivered.push(entry.id);
        }

        report.remaining = self.store.pending_count().await?;
        Ok(FlushOutcome::Completed(report))
    }

    async fn deliver(&self, entry: &QueuedEntry) -> Result<(), String> {
        let request = OutboundRequest {
            method: "POST".to_string(),
            url: self.endpoint.clone(),
            headers: entry.headers.clone(),
            body: Some(Bytes::from(entry.payload.clone())),
        };

        match self.transport.send(&request).await {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => Err(format!("status {}", response.status)),
            Err(e) if e.is_acknowledged() => {
                tracing::warn!(outbox_id = entry.id, error = %e, "delivery acknowledged, response body lost");
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::{ScriptedTransport, Step};

    async fn flusher(steps: Vec<Step>) -> (Flusher, Arc<ScriptedTransport>, Store) {
        let store = Store::open_in_memory().await.unwrap();
        let transport = Arc::new(ScriptedTransport::new(steps));
        let flusher = Flusher::new(&AppConfig::default(), store.clone(), transport.clone()).unwrap();
        (flusher, transport, store)
    }

    async fn enqueue_all(store: &Store, msgs: &[&str]) {
        for msg in msgs {
            let headers = vec![("content-type".to_string(), "application/json".to_string())];
            store
                .enqueue(format!(r#"{{"msg":"{msg}"}}"#).as_bytes(), &headers)
                .await
                .unwrap();
        }
    }

    fn completed(outcome: FlushOutcome) -> FlushReport {
        match outcome {
            FlushOutcome::Completed(report) => report,
            FlushOutcome::Skipped => panic!("flush unexpectedly skipped"),
        }
    }

    #[tokio::test]
    async fn test_flush_delivers_in_order() {
        let (flusher, transport, store) = flusher(vec![]).await;
        enqueue_all(&store, &["a", "b", "c"]).await;

        let report = completed(flusher.flush().await.unwrap());

        assert_eq!(report.delivered, vec![1, 2, 3]);
        assert_eq!(report.remaining, 0);
        assert!(report.halted.is_none());
        assert_eq!(transport.bodies(), vec![r#"{"msg":"a"}"#, r#"{"msg":"b"}"#, r#"{"msg":"c"}"#]);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flush_replays_to_durable_endpoint_with_headers() {
        let (flusher, transport, store) = flusher(vec![]).await;
        enqueue_all(&store, &["a"]).await;

        completed(flusher.flush().await.unwrap());

        let seen = transport.seen();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].url.as_str(), "http://127.0.0.1:8000/api/chat/messages");
        assert_eq!(seen[0].headers, vec![("content-type".to_string(), "application/json".to_string())]);
    }

    #[tokio::test]
    async fn test_flush_halts_on_transport_failure() {
        let (flusher, transport, store) = flusher(vec![Step::Respond(200, "ok"), Step::Fail]).await;
        enqueue_all(&store, &["a", "b", "c"]).await;

        let report = completed(flusher.flush().await.unwrap());

        assert_eq!(report.delivered, vec![1]);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.halted.as_ref().map(|h| h.id), Some(2));
        assert_eq!(transport.seen().len(), 2);

        let ids: Vec<i64> = store.list_pending().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_flush_halts_on_rejection() {
        let (flusher, _, store) = flusher(vec![Step::Respond(500, "boom")]).await;
        enqueue_all(&store, &["a", "b"]).await;

        let report = completed(flusher.flush().await.unwrap());

        assert!(report.delivered.is_empty());
        assert_eq!(report.halted, Some(Halt { id: 1, reason: "status 500".into() }));
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_acknowledged_delivery_with_lost_body_is_removed() {
        let (flusher, transport, store) = flusher(vec![Step::Truncated(201), Step::Truncated(502)]).await;
        enqueue_all(&store, &["a", "b"]).await;

        let report = completed(flusher.flush().await.unwrap());

        assert_eq!(report.delivered, vec![1]);
        assert_eq!(report.halted.as_ref().map(|h| h.id), Some(2));
        assert_eq!(transport.seen().len(), 2);
        let ids: Vec<i64> = store.list_pending().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_second_flush_resumes_after_halt() {
        let (flusher, transport, store) = flusher(vec![Step::Respond(200, "ok"), Step::Fail]).await;
        enqueue_all(&store, &["a", "b", "c"]).await;

        completed(flusher.flush().await.unwrap());
        let report = completed(flusher.flush().await.unwrap());

        assert_eq!(report.delivered, vec![2, 3]);
        assert_eq!(report.remaining, 0);
        let bodies = transport.bodies();
        assert_eq!(&bodies[bodies.len() - 2..], &[r#"{"msg":"b"}"#, r#"{"msg":"c"}"#]);
    }

    #[tokio::test]
    async fn test_flush_on_empty_outbox() {
        let (flusher, transport, _) = flusher(vec![]).await;
        let report = completed(flusher.flush().await.unwrap());

        assert_eq!(report, FlushReport::default());
        assert!(transport.seen().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_flush_is_skipped() {
        let (flusher, _, store) = flusher(vec![Step::Hang]).await;
        enqueue_all(&store, &["a"]).await;
        let flusher = Arc::new(flusher);

        let first = {
            let flusher = Arc::clone(&flusher);
            tokio::spawn(async move { flusher.flush().await })
        };

        let mut skipped = false;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if flusher.flush().await.unwrap() == FlushOutcome::Skipped {
                skipped = true;
                break;
            }
        }

        assert!(skipped);
        first.abort();
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }
}
