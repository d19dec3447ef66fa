//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying pragmas, and
//! running migrations. `synchronous=FULL` makes every committed enqueue and
//! removal durable before the call returns.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=FULL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Store handle shared by the response cache and the outbox.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread, one statement batch at a time. Cloning is
/// cheap and every clone talks to the same connection.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open a database at the specified path.
    ///
    /// Creates the file and its parent directory if missing, applies
    /// pragmas, and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::InvalidInput(format!("cannot create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = Store::open_in_memory().await.unwrap();
        let version = store
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_connection() {
        let store = Store::open_in_memory().await.unwrap();
        let other = store.clone();
        other.enqueue(b"{}", &[]).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }
}
