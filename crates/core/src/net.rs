//! Request/response types and the network origin seam.
//!
//! The agent never talks to the network directly; everything goes through a
//! [`Fetcher`], which the client crate implements with reqwest and tests
//! implement with in-memory fakes.

use std::fmt;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Whether credentials (cookies) travel with a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl CredentialsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Omit => "omit",
            Self::SameOrigin => "same-origin",
            Self::Include => "include",
        }
    }
}

impl fmt::Display for CredentialsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub credentials: CredentialsMode,
}

impl Request {
    pub fn new(url: Url) -> Self {
        Self { url, credentials: CredentialsMode::default() }
    }

    /// Parse an absolute URL into a request with default credentials.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(url))
    }

    pub fn with_credentials(mut self, credentials: CredentialsMode) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A response body plus the metadata the caches keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn ok(url: impl Into<String>, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status: 200, content_type: content_type.map(str::to_string), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }
}

/// The network origin collaborator.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a live network fetch.
    ///
    /// Non-success statuses are returned as responses, not errors; callers
    /// that need a 2xx check it with [`Response::is_success`].
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
