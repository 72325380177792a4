//! Article search with stale-result suppression.
//!
//! Every input bumps a [`SearchEpoch`]. Work started for an older epoch may
//! still finish, but its result is dropped instead of overwriting the view.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use crate::Error;
use crate::net::{Fetcher, Request};

/// Message shown when the search backend fails.
pub const SEARCH_FAILED: &str = "Search failed";

/// Monotonic counter of search inputs.
#[derive(Debug, Default)]
pub struct SearchEpoch(AtomicU64);

impl SearchEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch and return it.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchHit {
    pub title: String,
    #[serde(rename = "urlId")]
    pub url_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<SearchHit>, Error>;
}

/// Searches the origin's `/search.json` endpoint.
pub struct WikiSearch {
    fetcher: Arc<dyn Fetcher>,
    endpoint: Url,
}

impl WikiSearch {
    pub fn new(fetcher: Arc<dyn Fetcher>, origin: &Url) -> Result<Self, Error> {
        let endpoint = origin
            .join("/search.json")
            .map_err(|e| Error::InvalidUrl(format!("{origin}: {e}")))?;
        Ok(Self { fetcher, endpoint })
    }

    pub fn url_for(&self, term: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("s", term);
        url
    }
}

#[async_trait]
impl SearchBackend for WikiSearch {
    async fn search(&self, term: &str) -> Result<Vec<SearchHit>, Error> {
        let request = Request::new(self.url_for(term));
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(Error::HttpError(format!("{}: status {}", request.url, response.status)));
        }
        response.json()
    }
}

/// What the results panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum SearchView {
    Hidden,
    Results { hits: Vec<SearchHit> },
    Failed { message: String },
}

pub struct SearchController {
    backend: Arc<dyn SearchBackend>,
    epoch: SearchEpoch,
    debounce: Duration,
    view: watch::Sender<SearchView>,
}

impl SearchController {
    pub fn new(backend: Arc<dyn SearchBackend>, debounce: Duration) -> Self {
        let (view, _) = watch::channel(SearchView::Hidden);
        Self { backend, epoch: SearchEpoch::new(), debounce, view }
    }

    pub fn view(&self) -> SearchView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.view.subscribe()
    }

    /// Handle one input value.
    ///
    /// Returns true if this input's outcome reached the view, false if a
    /// later input superseded it.
    pub async fn on_input(&self, value: &str) -> bool {
        let epoch = self.epoch.next();
        if value.is_empty() {
            self.view.send_replace(SearchView::Hidden);
            return true;
        }

        tokio::time::sleep(self.debounce).await;
        if !self.epoch.is_current(epoch) {
            return false;
        }

        let view = match self.backend.search(value).await {
            Ok(hits) => SearchView::Results { hits },
            Err(e) => {
                tracing::warn!(term = %value, error = %e, "search failed");
                SearchView::Failed { message: SEARCH_FAILED.to_string() }
            }
        };
        if !self.epoch.is_current(epoch) {
            tracing::debug!(term = %value, epoch, "discarding stale search result");
            return false;
        }
        self.view.send_replace(view);
        true
    }
}
