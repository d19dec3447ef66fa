//! SQLite-backed storage for the response cache and the durable outbox.
//!
//! This module provides a persistent store using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - Request-identity cache keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode with full sync, so each write is durable on return
//! - Generation-scoped cache records with wholesale purge
//! - A FIFO outbox with monotonic, never-reused ids

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod outbox;
pub mod responses;

pub use connection::Store;
pub use outbox::QueuedEntry;
pub use responses::CacheRecord;
