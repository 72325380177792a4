//! Durable key/value store.
//!
//! `get` and `set` of JSON values by string key. No transactions, no listing.

use chrono::Utc;
use serde_json::Value;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use crate::Error;

/// Async key/value persistence.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error>;

    async fn set(&self, key: &str, value: Value) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl KeyValueStore for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT value_json FROM kv WHERE key = ?1", params![key], |row| row.get(0));
                match result {
                    Ok(json) => Ok(Some(json)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(|json| serde_json::from_str(&json).map_err(Error::from)).transpose()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        let key = key.to_string();
        let json = serde_json::to_string(&value)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value_json, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![key, json, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get("controller").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set("controller", json!("wikioffline-static-v19")).await.unwrap();
        db.set("controller", json!("wikioffline-static-v20")).await.unwrap();

        assert_eq!(db.get("controller").await.unwrap(), Some(json!("wikioffline-static-v20")));
    }

    #[tokio::test]
    async fn test_structured_values() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set("to-bg-cache", json!(["Cat", "Dog"])).await.unwrap();
        assert_eq!(db.get("to-bg-cache").await.unwrap(), Some(json!(["Cat", "Dog"])));
    }
}
