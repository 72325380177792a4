//! Named caches.
//!
//! A named cache is a set of `(request, response)` pairs. Entries are keyed by
//! [`request_key`] and never mutate in place; re-putting a key replaces the
//! entry. Deleting a cache removes all of its entries in one statement, so a
//! concurrent reader either sees the entry or misses.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::task::JoinSet;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::hash::request_key;
use crate::Error;
use crate::net::{CredentialsMode, Fetcher, Request, Response};

/// Handle to one named cache inside a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct NamedCache {
    db: CacheDb,
    name: String,
}

fn parse_credentials(raw: &str) -> CredentialsMode {
    match raw {
        "omit" => CredentialsMode::Omit,
        "include" => CredentialsMode::Include,
        _ => CredentialsMode::SameOrigin,
    }
}

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<Response> {
    Ok(Response {
        url: row.get(0)?,
        status: row.get::<_, u16>(1)?,
        content_type: row.get(2)?,
        body: Bytes::from(row.get::<_, Vec<u8>>(3)?),
    })
}

impl CacheDb {
    /// Open (creating if needed) the cache with the given name.
    pub async fn open_cache(&self, name: &str) -> Result<NamedCache, Error> {
        let owned = name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(NamedCache { db: self.clone(), name: name.to_string() })
    }

    /// Handle to a cache without creating it; the first write does.
    pub fn named(&self, name: &str) -> NamedCache {
        NamedCache { db: self.clone(), name: name.to_string() }
    }

    /// Whether a cache with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All cache names, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and all of its entries.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up across every cache, oldest cache first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key = request_key(request);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.url, e.status, e.content_type, e.body
                     FROM cache_entries e JOIN caches c ON c.name = e.cache_name
                     WHERE e.request_key = ?1
                     ORDER BY c.id ASC LIMIT 1",
                )?;

                match stmt.query_row(params![key], row_to_response) {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

impl NamedCache {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response for a request, replacing any previous entry.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_all(vec![(request.clone(), response.clone())]).await
    }

    /// Store several entries in one transaction.
    pub async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        let name = self.name.clone();
        let now = Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                for (request, response) in &entries {
                    tx.execute(
                        "INSERT INTO cache_entries (
                            cache_name, request_key, url, credentials, status, content_type, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(cache_name, request_key) DO UPDATE SET
                            url = excluded.url,
                            credentials = excluded.credentials,
                            status = excluded.status,
                            content_type = excluded.content_type,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                        params![
                            name,
                            request_key(request),
                            request.url.as_str(),
                            request.credentials.as_str(),
                            response.status,
                            response.content_type,
                            response.body.as_ref(),
                            now,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up in this cache only.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let name = self.name.clone();
        let key = request_key(request);
        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, content_type, body FROM cache_entries
                     WHERE cache_name = ?1 AND request_key = ?2",
                )?;

                match stmt.query_row(params![name, key], row_to_response) {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// The requests stored in this cache, in insertion order.
    pub async fn keys(&self) -> Result<Vec<Request>, Error> {
        let name = self.name.clone();
        let rows = self
            .db
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url, credentials FROM cache_entries WHERE cache_name = ?1 ORDER BY rowid")?;
                let rows = stmt
                    .query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<(String, String)>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(url, credentials)| Ok(Request::parse(&url)?.with_credentials(parse_credentials(&credentials))))
            .collect()
    }

    /// Delete every entry whose request is not in `keep`.
    ///
    /// Returns the number of deleted entries.
    pub async fn retain(&self, keep: &[Request]) -> Result<u64, Error> {
        let name = self.name.clone();
        let keep: Vec<String> = keep.iter().map(request_key).collect();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT request_key FROM cache_entries WHERE cache_name = ?1")?;
                    stmt.query_map(params![name], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<String>, _>>()?
                        .into_iter()
                        .filter(|k| !keep.contains(k))
                        .collect()
                };
                for key in &stale {
                    tx.execute(
                        "DELETE FROM cache_entries WHERE cache_name = ?1 AND request_key = ?2",
                        params![name, key],
                    )?;
                }
                tx.commit()?;
                Ok(stale.len() as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Fetch every request and store the results.
    ///
    /// Nothing is written unless every fetch returns a 2xx response.
    /// Returns the number of entries written.
    pub async fn add_all(&self, fetcher: Arc<dyn Fetcher>, requests: Vec<Request>) -> Result<usize, Error> {
        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in fetch_all(fetcher, requests).await {
            let response = result?;
            if !response.is_success() {
                return Err(Error::HttpError(format!("{}: status {}", request.url, response.status)));
            }
            fetched.push((request, response));
        }

        let count = fetched.len();
        self.put_all(fetched).await?;
        Ok(count)
    }
}

/// Fetch requests concurrently, returning results in request order.
pub async fn fetch_all(fetcher: Arc<dyn Fetcher>, requests: Vec<Request>) -> Vec<(Request, Result<Response, Error>)> {
    let mut join_set = JoinSet::new();
    for (idx, request) in requests.iter().cloned().enumerate() {
        let fetcher = fetcher.clone();
        join_set.spawn(async move { (idx, fetcher.fetch(&request).await) });
    }

    let mut slots: Vec<Option<Result<Response, Error>>> = requests.iter().map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => tracing::warn!("fetch task panicked: {e}"),
        }
    }

    requests
        .into_iter()
        .zip(slots)
        .map(|(request, slot)| {
            let result = slot.unwrap_or_else(|| Err(Error::HttpError(format!("{}: fetch task aborted", request.url))));
            (request, result)
        })
        .collect()
}
