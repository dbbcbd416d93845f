//! Entry operations on a single store: match, put, delete.

use super::hash::compute_request_key;
use super::stores::Store;
use super::{format_timestamp, now_timestamp};
use crate::Error;
use crate::http::{Request, Response, ResponseSource};
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored entry with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub url: String,
    pub method: String,
    pub response: Response,
    pub revision: Option<String>,
    pub stored_at: String,
}

fn key_for(request: &Request) -> String {
    compute_request_key(&request.method, request.url.as_str())
}

impl Store {
    /// Exact match for the request descriptor.
    ///
    /// The returned response is tagged `ResponseSource::Cache`.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        Ok(self.entry(request).await?.map(|e| e.response))
    }

    /// Full stored entry for the request descriptor.
    pub async fn entry(&self, request: &Request) -> Result<Option<StoredEntry>, Error> {
        let store = self.name.clone();
        let key = key_for(request);
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, method, status, headers_json, body, revision, stored_at
                     FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                )?;

                let row = stmt.query_row(params![store, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                let (url, method, status, headers_json, body, revision, stored_at) = match row {
                    Ok(r) => r,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;

                Ok(Some(StoredEntry {
                    url,
                    method,
                    response: Response { status, headers, body, source: ResponseSource::Cache },
                    revision,
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response for the request, replacing any previous entry.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_at(request, response, None, Utc::now()).await
    }

    /// Store a precached asset together with its manifest revision.
    pub async fn put_revision(&self, request: &Request, response: &Response, revision: Option<&str>) -> Result<(), Error> {
        self.put_at(request, response, revision.map(str::to_string), Utc::now()).await
    }

    /// Store a response with an explicit write time.
    ///
    /// Every write takes the next sequence number, so a refreshed entry
    /// becomes the newest for eviction purposes.
    pub async fn put_at(
        &self, request: &Request, response: &Response, revision: Option<String>, stored_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let store = self.name.clone();
        let key = key_for(request);
        let method = request.method.to_ascii_uppercase();
        let url = request.url.to_string();
        let status = i64::from(response.status);
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.clone();
        let stored_at = format_timestamp(stored_at);
        let created_at = now_timestamp();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![store, created_at],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        store, key_hash, method, url, status, headers_json, body, revision, stored_at, seq
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                        (SELECT COALESCE(MAX(seq), 0) + 1 FROM cache_entries))
                    ON CONFLICT(store, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        revision = excluded.revision,
                        stored_at = excluded.stored_at,
                        seq = excluded.seq",
                    params![store, key, method, url, status, headers_json, body, revision, stored_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for the request. Returns false if there was none.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let store = self.name.clone();
        let key = key_for(request);
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let n = conn.execute("DELETE FROM cache_entries WHERE store = ?1 AND key_hash = ?2", params![store, key])?;
                Ok(n > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the store.
    pub async fn len(&self) -> Result<u64, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let n: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(n as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }

    /// URLs of stored entries, oldest write first.
    pub async fn urls(&self) -> Result<Vec<String>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY seq ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
