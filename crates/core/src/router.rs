//! Request interception.
//!
//! Every request is classified by origin and path, first match wins:
//!
//! 1. the application root: cache only
//! 2. the shell document: cache only
//! 3. under the content namespace (`/wiki/`):
//!    - a data resource (`.json`, `.inc`): take the speculative fetch a page
//!      request parked for it; without one, fall through to rule 4
//!    - a page: start fetches for both data resources, park them, and
//!      answer with the shell document
//! 4. everything else: any cache, then the network (nothing is written)
//!
//! The shell parses while its data is already in flight; the take-once
//! table makes the hand-off safe whichever side arrives first.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::Error;
use crate::cache::CacheDb;
use crate::manifest::Manifest;
use crate::net::{CredentialsMode, Fetcher, Request, Response};
use crate::prefetch::{PrefetchTable, Prefetched};
use crate::version::VersionManager;

const ROOT_PATH: &str = "/";
const SHELL_PATH: &str = "/shell.html";
const CONTENT_PREFIX: &str = "/wiki/";

static DATA_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.(json|inc)$").expect("valid data suffix regex"));

/// Which strategy serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Root,
    Shell,
    Data,
    Page,
    Passthrough,
}

/// The sibling data URLs a content page prefetches: `<path>.json` and
/// `<path>.inc`, query and fragment removed.
pub fn data_urls(page: &Url) -> [Url; 2] {
    ["json", "inc"].map(|ext| {
        let mut url = page.clone();
        url.set_path(&format!("{}.{ext}", page.path()));
        url.set_query(None);
        url.set_fragment(None);
        url
    })
}

fn prefetch_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Routes requests between the static cache, the prefetch table and the network.
pub struct Interceptor {
    origin: Url,
    db: CacheDb,
    versions: Arc<VersionManager>,
    fetcher: Arc<dyn Fetcher>,
    prefetch: Arc<PrefetchTable<Prefetched>>,
    root: Request,
    shell: Request,
    prefetch_timeout: Duration,
}

impl Interceptor {
    /// Build an interceptor.
    ///
    /// The root and shell documents are looked up with the credentials mode
    /// the manifest installed them with.
    pub fn new(
        origin: Url, manifest: &Manifest, db: CacheDb, versions: Arc<VersionManager>, fetcher: Arc<dyn Fetcher>,
        prefetch: Arc<PrefetchTable<Prefetched>>, prefetch_timeout: Duration,
    ) -> Result<Self, Error> {
        let installed = |path: &str| -> Result<Request, Error> {
            let credentials = manifest
                .entries
                .iter()
                .find(|e| e.path == path)
                .map(|e| e.credentials)
                .unwrap_or_default();
            let url = origin.join(path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            Ok(Request::new(url).with_credentials(credentials))
        };
        let root = installed(ROOT_PATH)?;
        let shell = installed(SHELL_PATH)?;

        Ok(Self { origin, db, versions, fetcher, prefetch, root, shell, prefetch_timeout })
    }

    /// Classify a URL without side effects.
    pub fn classify(&self, url: &Url) -> Route {
        if url.origin() != self.origin.origin() {
            return Route::Passthrough;
        }

        let path = url.path();
        if path == ROOT_PATH {
            Route::Root
        } else if path == SHELL_PATH {
            Route::Shell
        } else if path.starts_with(CONTENT_PREFIX) {
            if DATA_SUFFIX.is_match(path) { Route::Data } else { Route::Page }
        } else {
            Route::Passthrough
        }
    }

    /// Answer one request.
    pub async fn handle(&self, request: &Request) -> Result<Response, Error> {
        let route = self.classify(&request.url);
        tracing::debug!(url = %request.url, ?route, "intercepted request");

        match route {
            Route::Root => self.cache_only(&self.root).await,
            Route::Shell => self.cache_only(&self.shell).await,
            Route::Data => match self.take_prefetched(&request.url).await {
                Some(response) => Ok(response),
                // data is always fetched and saved credentialed
                None => {
                    let credentialed = request.clone().with_credentials(CredentialsMode::Include);
                    self.cache_or_network(&credentialed).await
                }
            },
            Route::Page => {
                self.prefetch_data(&request.url).await;
                self.cache_only(&self.shell).await
            }
            Route::Passthrough => self.cache_or_network(request).await,
        }
    }

    async fn cache_only(&self, request: &Request) -> Result<Response, Error> {
        self.versions
            .current()
            .await?
            .match_request(request)
            .await?
            .ok_or_else(|| Error::CacheMiss(request.url.to_string()))
    }

    async fn cache_or_network(&self, request: &Request) -> Result<Response, Error> {
        if let Some(hit) = self.db.match_any(request).await? {
            return Ok(hit);
        }
        self.fetcher.fetch(request).await
    }

    /// Start credentialed fetches for a page's data resources and park them.
    async fn prefetch_data(&self, page: &Url) {
        for url in data_urls(page) {
            let key = prefetch_key(&url);
            let request = Request::new(url).with_credentials(CredentialsMode::Include);
            let fetcher = self.fetcher.clone();
            let handle: Prefetched = tokio::spawn(async move { fetcher.fetch(&request).await });
            self.prefetch.put(key, handle).await;
        }
    }

    /// Consume the parked fetch for a data URL.
    ///
    /// Returns `None` when nothing was parked, the fetch failed, or it did
    /// not settle within the prefetch timeout; the caller then serves the
    /// request the ordinary way instead of leaving it unanswered.
    async fn take_prefetched(&self, url: &Url) -> Option<Response> {
        let key = prefetch_key(url);
        let Some(handle) = self.prefetch.take(&key).await else {
            tracing::debug!(%key, "no prefetch entry, falling back");
            return None;
        };

        match tokio::time::timeout(self.prefetch_timeout, handle).await {
            Ok(Ok(Ok(response))) => Some(response),
            Ok(Ok(Err(e))) => {
                tracing::debug!(%key, error = %e, "prefetch failed, falling back");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(%key, error = %e, "prefetch task failed");
                None
            }
            Err(_) => {
                tracing::warn!(%key, timeout_ms = self.prefetch_timeout.as_millis() as u64, "prefetch timed out");
                None
            }
        }
    }
}
