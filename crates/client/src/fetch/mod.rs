//! HTTP fetch pipeline for the agent's network origin.
//!
//! ### Credentials
//! - `omit`: never sends the flags cookie
//! - `same-origin`: sends it only to the configured origin
//! - `include`: always sends it
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! Non-2xx responses are returned, not raised; callers decide what a
//! status means for them.

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url, header};

pub use self::url::{UrlError, resolve, same_origin};

use wikioffline_core::{AppConfig, CredentialsMode, Error, Fetcher, Request, Response};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "wikioffline/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin that `same-origin` requests send credentials to
    pub origin: Option<Url>,

    /// Cookie header value for credentialed requests
    pub flags_cookie: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "wikioffline/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
            flags_cookie: None,
        }
    }
}

impl FetchConfig {
    /// Derive the client settings from the application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            origin: Some(origin),
            flags_cookie: config.flags_cookie.clone(),
            ..Self::default()
        })
    }
}

/// HTTP fetch client implementing [`Fetcher`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// The cookie to attach to a request, if its credentials mode allows one.
    pub fn cookie_for(&self, request: &Request) -> Option<&str> {
        let cookie = self.config.flags_cookie.as_deref()?;
        match request.credentials {
            CredentialsMode::Include => Some(cookie),
            CredentialsMode::SameOrigin => self
                .config
                .origin
                .as_ref()
                .filter(|origin| same_origin(origin, &request.url))
                .map(|_| cookie),
            CredentialsMode::Omit => None,
        }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = &request.url;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
        }

        let mut builder = self.http.get(url.as_str());
        if let Some(cookie) = self.cookie_for(request) {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{url}: {e}"))
            } else {
                Error::HttpError(format!("network error: {e}"))
            }
        })?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::HttpError(format!("{url}: {len} bytes exceeds {}", self.config.max_bytes)));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::HttpError(format!("{url}: {} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            url = %url,
            credentials = %request.credentials,
            status,
            fetch_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "fetched"
        );

        Ok(Response { url: final_url, status, content_type, body })
    }
}
