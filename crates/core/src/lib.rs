//! Core types and shared functionality for courier.
//!
//! This crate provides:
//! - Request classification
//! - Response cache and durable outbox with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod classify;
pub mod config;
pub mod error;
pub mod store;

pub use classify::{ClassifierRules, Destination, Disposition, RequestDescriptor, classify};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{CacheRecord, QueuedEntry, Store};
