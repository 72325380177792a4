//! SQLite-backed storage for the offline agent.
//!
//! This module provides the durable state the agent keeps, using SQLite
//! with async access via tokio-rusqlite:
//!
//! - Named caches of `(request, response)` pairs
//! - A small JSON key/value store
//! - The append-only background sync job log
//! - Automatic schema migrations

pub mod connection;
pub mod hash;
pub mod jobs;
pub mod kv;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use jobs::{JobLog, SyncJob};
pub use kv::KeyValueStore;
pub use storage::{NamedCache, fetch_all};
