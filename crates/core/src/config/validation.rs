//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - `cache_prefix` is empty or contains `-`
    /// - `cache_version` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `prefetch_timeout_ms` is 0 or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `manifest` is empty or has a path not starting with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }
        // names are `<prefix>-static-v<n>` and `<prefix>-article-<name>`; a '-' in the prefix makes them ambiguous
        if self.cache_prefix.contains('-') {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not contain '-'".into() });
        }

        if self.cache_version == 0 {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.prefetch_timeout_ms == 0 || self.prefetch_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "prefetch_timeout_ms".into(),
                reason: "must be between 1 and 300000ms".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.manifest.is_empty() {
            return Err(ConfigError::Invalid { field: "manifest".into(), reason: "must list at least one resource".into() });
        }
        if let Some(entry) = self.manifest.entries.iter().find(|e| !e.path.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "manifest".into(),
                reason: format!("path {:?} must start with '/'", entry.path),
            });
        }

        if self.auto_accept_updates {
            tracing::warn!("auto_accept_updates is set; updates will take control without confirmation");
        }

        Ok(())
    }
}
