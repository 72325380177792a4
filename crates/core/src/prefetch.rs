//! Cross-request hand-off slots for speculative fetches.
//!
//! A page request starts the fetches for its data resources and parks the
//! in-flight handles here; the data requests that follow take them out.
//! Entries live only as long as the table (never persisted), are consumed
//! at most once, and a second `put` for the same key replaces the first
//! (last write wins, the replaced value is simply dropped).

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::Error;
use crate::net::Response;

/// An in-flight or finished speculative fetch.
pub type Prefetched = JoinHandle<Result<Response, Error>>;

/// Keyed hand-off table with take-once semantics.
#[derive(Debug)]
pub struct PrefetchTable<T> {
    entries: Mutex<HashMap<String, T>>,
}

impl<T> Default for PrefetchTable<T> {
    fn default() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

impl<T> PrefetchTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a value under `key`, returning whatever it replaced.
    pub async fn put(&self, key: impl Into<String>, value: T) -> Option<T> {
        let key = key.into();
        let replaced = self.entries.lock().await.insert(key.clone(), value);
        if replaced.is_some() {
            tracing::debug!(%key, "prefetch entry overwritten");
        }
        replaced
    }

    /// Remove and return the value under `key`, if any.
    pub async fn take(&self, key: &str) -> Option<T> {
        self.entries.lock().await.remove(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
