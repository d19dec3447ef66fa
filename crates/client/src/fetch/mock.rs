//! Scripted transport for tests.

use super::{FetchResponse, OutboundRequest, Transport, TransportError};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the next `send` does.
pub(crate) enum Step {
    Respond(u16, &'static str),
    Fail,
    /// Status arrives, then the body read fails.
    Truncated(u16),
    /// Never resolves.
    Hang,
}

/// Plays back a script of outcomes and records every request it sees.
///
/// Once the script runs out every request answers `200` with an empty body.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self { steps: Mutex::new(steps.into_iter().collect()), seen: Mutex::new(Vec::new()) }
    }

    pub(crate) fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub(crate) fn seen(&self) -> Vec<OutboundRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn bodies(&self) -> Vec<String> {
        self.seen()
            .iter()
            .map(|r| String::from_utf8_lossy(r.body.as_deref().unwrap_or_default()).to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<FetchResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(status, body)) => Ok(FetchResponse {
                status,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: Bytes::from_static(body.as_bytes()),
                fetch_ms: 1,
            }),
            Some(Step::Fail) => Err(TransportError::Unavailable("connection refused".into())),
            Some(Step::Truncated(status)) => Err(TransportError::Incomplete {
                status,
                headers: Vec::new(),
                reason: "connection reset while reading body".into(),
            }),
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(FetchResponse { status: 200, headers: Vec::new(), body: Bytes::new(), fetch_ms: 1 }),
        }
    }
}
