//! Response cache operations.
//!
//! Records are partitioned by generation. Lookups and writes always name the
//! generation explicitly; a version bump makes older generations unreachable
//! and [`Store::purge_obsolete_generations`] deletes them.

use super::connection::Store;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Snapshot of the last known-good response for one request identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheRecord {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl Store {
    /// Read a cached record. Purely local.
    pub async fn lookup(&self, generation: &str, key: &str) -> Result<Option<CacheRecord>, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status_code, content_type, headers_json, body, stored_at
                     FROM cache_records WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u16>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                });

                match result {
                    Ok((key, method, url, status_code, content_type, headers_json, body, stored_at)) => {
                        Ok(Some(CacheRecord {
                            key,
                            method,
                            url,
                            status_code,
                            content_type,
                            headers: serde_json::from_str(&headers_json)?,
                            body,
                            stored_at,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite the record for its key. Last writer wins.
    ///
    /// Callers treat failures as best-effort: log and carry on.
    pub async fn populate(&self, generation: &str, record: &CacheRecord) -> Result<(), Error> {
        let generation = generation.to_string();
        let record = record.clone();
        let headers_json = serde_json::to_string(&record.headers)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_records (
                        generation, key, method, url, status_code, content_type,
                        headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(generation, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status_code = excluded.status_code,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        generation,
                        &record.key,
                        &record.method,
                        &record.url,
                        record.status_code,
                        &record.content_type,
                        headers_json,
                        &record.body,
                        &record.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Enumerate every generation that currently holds records.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT generation FROM cache_records ORDER BY generation")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut generations = Vec::new();
                for row in rows {
                    generations.push(row?);
                }
                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation other than `current`.
    ///
    /// Each generation is dropped in its own statement, so an interrupted
    /// purge leaves whole generations behind, never half of one.
    /// Returns the number of deleted records.
    pub async fn purge_obsolete_generations(&self, current: &str) -> Result<u64, Error> {
        let mut deleted = 0u64;
        for generation in self.list_generations().await? {
            if generation == current {
                continue;
            }

            let target = generation.clone();
            let count = self
                .conn
                .call(move |conn| -> Result<u64, Error> {
                    let count = conn.execute("DELETE FROM cache_records WHERE generation = ?1", params![target])?;
                    Ok(count as u64)
                })
                .await
                .map_err(Error::from)?;

            tracing::info!(generation = %generation, records = count, "purged obsolete cache generation");
            deleted += count;
        }
        Ok(deleted)
    }
}
