//! Durable outbox operations.
//!
//! A FIFO log of writes that could not be delivered. Ids come from SQLite's
//! AUTOINCREMENT, so they grow monotonically and are never handed out twice.
//! Entries are immutable: created by [`Store::enqueue`], destroyed by
//! [`Store::remove`], never updated.

use super::connection::Store;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// One pending write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueuedEntry {
    pub id: i64,
    /// Opaque request body, replayed byte for byte.
    pub payload: Vec<u8>,
    /// Headers needed to replay the request (content type, credentials).
    pub headers: Vec<(String, String)>,
    /// Diagnostics only. Ordering is by `id`.
    pub enqueued_at: String,
}

impl Store {
    /// Append a payload and return its id.
    ///
    /// The row is committed before this returns. Failures propagate: the
    /// caller has no durability left to offer.
    pub async fn enqueue(&self, payload: &[u8], headers: &[(String, String)]) -> Result<i64, Error> {
        let payload = payload.to_vec();
        let headers_json = serde_json::to_string(headers)?;
        let enqueued_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO outbox (payload, headers_json, enqueued_at) VALUES (?1, ?2, ?3)",
                    params![payload, headers_json, enqueued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// All pending entries in ascending id order.
    pub async fn list_pending(&self) -> Result<Vec<QueuedEntry>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<QueuedEntry>, Error> {
                let mut stmt =
                    conn.prepare("SELECT id, payload, headers_json, enqueued_at FROM outbox ORDER BY id ASC")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;

                let mut entries = Vec::new();
                for row in rows {
                    let (id, payload, headers_json, enqueued_at) = row?;
                    entries.push(QueuedEntry { id, payload, headers: serde_json::from_str(&headers_json)?, enqueued_at });
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of pending entries.
    pub async fn pending_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an entry. Removing an absent id is a no-op.
    ///
    /// Returns whether a row was actually deleted.
    pub async fn remove(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM outbox WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_headers() -> Vec<(String, String)> {
        vec![("content-type".to_string(), "application/json".to_string())]
    }

    #[tokio::test]
    async fn test_enqueue_assigns_increasing_ids() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store.enqueue(br#"{"msg":"a"}"#, &json_headers()).await.unwrap();
        let b = store.enqueue(br#"{"msg":"b"}"#, &json_headers()).await.unwrap();
        let c = store.enqueue(br#"{"msg":"c"}"#, &json_headers()).await.unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[tokio::test]
    async fn test_list_pending_in_id_order() {
        let store = Store::open_in_memory().await.unwrap();
        for msg in ["a", "b", "c"] {
            store
                .enqueue(format!(r#"{{"msg":"{msg}"}}"#).as_bytes(), &json_headers())
                .await
                .unwrap();
        }

        let pending = store.list_pending().await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(pending[0].payload, br#"{"msg":"a"}"#);
        assert_eq!(pending[2].headers, json_headers());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store.enqueue(b"x", &[]).await.unwrap();

        assert!(store.remove(id).await.unwrap());
        assert!(!store.remove(id).await.unwrap());
        assert!(!store.remove(9_999).await.unwrap());
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_never_reused() {
        let store = Store::open_in_memory().await.unwrap();
        let first = store.enqueue(b"a", &[]).await.unwrap();
        store.remove(first).await.unwrap();

        let second = store.enqueue(b"b", &[]).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_get_distinct_ids() {
        let store = Store::open_in_memory().await.unwrap();
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.enqueue(&[i], &[]).await.unwrap() }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        assert_eq!(store.pending_count().await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_outbox_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "courier-outbox-{}-{}.sqlite",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        {
            let store = Store::open(&path).await.unwrap();
            store.enqueue(br#"{"msg":"a"}"#, &json_headers()).await.unwrap();
            store.enqueue(br#"{"msg":"b"}"#, &json_headers()).await.unwrap();
        }

        let reopened = Store::open(&path).await.unwrap();
        let pending = reopened.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].payload, br#"{"msg":"b"}"#);

        drop(reopened);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
