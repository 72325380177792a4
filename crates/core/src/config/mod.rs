//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WIKIOFFLINE_*)
//! 2. TOML config file (if WIKIOFFLINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::manifest::Manifest;
use crate::version::CacheVersion;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WIKIOFFLINE_*)
/// 2. TOML config file (if WIKIOFFLINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The single origin the agent intercepts for.
    ///
    /// Set via WIKIOFFLINE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to the SQLite database holding caches, key/value data and the sync log.
    ///
    /// Set via WIKIOFFLINE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Naming prefix shared by every cache this agent owns.
    ///
    /// Set via WIKIOFFLINE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Static cache version. Bump it to force a full re-install.
    ///
    /// Set via WIKIOFFLINE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via WIKIOFFLINE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via WIKIOFFLINE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long a data request waits on a speculative fetch before fetching directly.
    ///
    /// Set via WIKIOFFLINE_PREFETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_prefetch_timeout_ms")]
    pub prefetch_timeout_ms: u64,

    /// Quiet period before a non-empty search input hits the network.
    ///
    /// Set via WIKIOFFLINE_SEARCH_DEBOUNCE_MS environment variable.
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Icon attached to "article ready" notifications.
    ///
    /// Set via WIKIOFFLINE_NOTIFICATION_ICON environment variable.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Cookie header sent with credentialed requests (carries flag state).
    ///
    /// Set via WIKIOFFLINE_FLAGS_COOKIE environment variable.
    #[serde(default)]
    pub flags_cookie: Option<String>,

    /// Answer "reload" to update prompts without asking.
    ///
    /// Set via WIKIOFFLINE_AUTO_ACCEPT_UPDATES environment variable.
    #[serde(default)]
    pub auto_accept_updates: bool,

    /// Static resources precached on install. TOML only.
    #[serde(default)]
    pub manifest: Manifest,
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./wikioffline.sqlite")
}

fn default_cache_prefix() -> String {
    "wikioffline".into()
}

fn default_cache_version() -> u32 {
    20
}

fn default_user_agent() -> String {
    "wikioffline/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_prefetch_timeout_ms() -> u64 {
    10_000
}

fn default_search_debounce_ms() -> u64 {
    150
}

fn default_notification_icon() -> String {
    "/imgs/wikipedia-192.png".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            prefetch_timeout_ms: default_prefetch_timeout_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            notification_icon: default_notification_icon(),
            flags_cookie: None,
            auto_accept_updates: false,
            manifest: Manifest::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn prefetch_timeout(&self) -> Duration {
        Duration::from_millis(self.prefetch_timeout_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// The configured origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {other}") }),
        }
    }

    /// The static cache version this process considers current.
    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(&self.cache_prefix, self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WIKIOFFLINE_`
    /// 2. TOML file from `WIKIOFFLINE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WIKIOFFLINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WIKIOFFLINE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
