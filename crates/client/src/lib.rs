//! Client side of the courier relay.
//!
//! This crate provides the network transport, the interception gateway, the
//! outbox flusher and the [`Relay`] context that ties them to one store.

pub mod fetch;
pub mod flusher;
pub mod gateway;
pub mod relay;

pub use fetch::{FetchConfig, FetchResponse, HttpTransport, OutboundRequest, Transport, TransportError};
pub use flusher::{FlushOutcome, FlushReport, Flusher, Halt};
pub use gateway::{Gateway, GatewayResponse, InterceptedRequest, QUEUED_HEADER, QUEUED_STATUS, ResponseSource};
pub use relay::{LifecycleState, Relay, Trigger, TriggerOutcome};
