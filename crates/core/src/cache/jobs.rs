//! Append-only log of pending background sync jobs.
//!
//! Each job gets a monotonically increasing sequence number on append.
//! Consumers acknowledge a prefix of the log with [`JobLog::ack_through`],
//! so jobs appended after a snapshot was read are never lost.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use crate::Error;

/// A deferred "fetch, cache and notify" job for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncJob {
    pub seq: i64,
    pub article_name: String,
}

/// Durable job log.
#[async_trait::async_trait]
pub trait JobLog: Send + Sync {
    /// Atomically append a job.
    async fn append(&self, article_name: &str) -> Result<SyncJob, Error>;

    /// All unacknowledged jobs in sequence order.
    async fn pending(&self) -> Result<Vec<SyncJob>, Error>;

    /// Remove every job with `seq <= through`. Returns how many were removed.
    async fn ack_through(&self, through: i64) -> Result<u64, Error>;
}

#[async_trait::async_trait]
impl JobLog for CacheDb {
    async fn append(&self, article_name: &str) -> Result<SyncJob, Error> {
        let name = article_name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<SyncJob, Error> {
                conn.execute(
                    "INSERT INTO sync_jobs (article_name, enqueued_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(SyncJob { seq: conn.last_insert_rowid(), article_name: name })
            })
            .await
            .map_err(Error::from)
    }

    async fn pending(&self) -> Result<Vec<SyncJob>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<SyncJob>, Error> {
                let mut stmt = conn.prepare("SELECT seq, article_name FROM sync_jobs ORDER BY seq ASC")?;
                let jobs = stmt
                    .query_map([], |row| Ok(SyncJob { seq: row.get(0)?, article_name: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(Error::from)
    }

    async fn ack_through(&self, through: i64) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM sync_jobs WHERE seq <= ?1", params![through])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
