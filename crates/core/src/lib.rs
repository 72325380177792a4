//! Core of the wikioffline agent.
//!
//! This crate provides:
//! - Versioned static caches and per-article caches on a SQLite backend
//! - Request interception with speculative data prefetch
//! - A durable background sync queue with completion notifications
//! - The agent lifecycle state machine and update coordination
//! - Debounced, epoch-checked article search
//! - Unified error types and layered configuration

pub mod agent;
pub mod article;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod net;
pub mod notify;
pub mod prefetch;
pub mod router;
pub mod search;
pub mod sync;
pub mod version;

pub use agent::Agent;
pub use cache::{CacheDb, JobLog, KeyValueStore, SyncJob};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use lifecycle::{AgentMessage, LifecycleSignal, LifecycleState, UpdateCoordinator, UpdatePrompt, WorkerPort};
pub use net::{CredentialsMode, Fetcher, Request, Response};
pub use notify::{Notification, NotificationSink};
pub use search::{SearchHit, SearchView};
pub use sync::{DrainOutcome, DrainReport};
