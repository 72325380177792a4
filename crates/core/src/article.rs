//! Long-lived per-article caches.
//!
//! An article is two data resources, `/wiki/<name>.json` (which carries the
//! metadata) and `/wiki/<name>.inc` (rendered body). Saving an article
//! writes both into `<prefix>-article-<name>`, a cache version sweeps never
//! delete.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::CacheDb;
use crate::net::{CredentialsMode, Fetcher, Request};
use crate::version::CacheVersion;

/// Display metadata for an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ArticleMeta {
    pub title: String,
    /// Identifier used in deep links (`/wiki/<url_id>`).
    #[serde(rename = "urlId")]
    pub url_id: String,
}

#[derive(Deserialize)]
struct RawMeta {
    title: String,
    #[serde(rename = "urlId", default)]
    url_id: Option<String>,
}

/// `<origin>/wiki/<segment>`, with `segment` percent-encoded so titles
/// holding `?` or `#` stay in the path.
pub(crate) fn wiki_url(origin: &Url, segment: &str) -> Result<Url, Error> {
    let mut url = origin.join("/wiki/").map_err(|e| Error::InvalidUrl(format!("{origin}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidUrl(format!("{origin}: cannot be a base")))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

pub struct ArticleStore {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
    cache_prefix: String,
}

impl ArticleStore {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, origin: Url, version: &CacheVersion) -> Self {
        Self { db, fetcher, origin, cache_prefix: version.article_prefix() }
    }

    pub fn cache_name(&self, name: &str) -> String {
        format!("{}{name}", self.cache_prefix)
    }

    /// The data and body requests for an article, both credentialed.
    pub fn requests(&self, name: &str) -> Result<[Request; 2], Error> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidInput(format!("invalid article name: {name:?}")));
        }
        let resolve = |ext: &str| -> Result<Request, Error> {
            let url = wiki_url(&self.origin, &format!("{name}.{ext}"))?;
            Ok(Request::new(url).with_credentials(CredentialsMode::Include))
        };
        Ok([resolve("json")?, resolve("inc")?])
    }

    /// Resolve metadata, preferring a saved copy over the network.
    pub async fn meta(&self, name: &str) -> Result<ArticleMeta, Error> {
        let [data, _] = self.requests(name)?;
        let response = match self.db.match_any(&data).await? {
            Some(hit) => hit,
            None => self.fetcher.fetch(&data).await?,
        };
        if !response.is_success() {
            return Err(Error::HttpError(format!("{}: status {}", data.url, response.status)));
        }
        let raw: RawMeta = response.json()?;
        Ok(ArticleMeta { title: raw.title, url_id: raw.url_id.unwrap_or_else(|| name.to_string()) })
    }

    /// Fetch both resources and save them in the article's cache.
    ///
    /// Returns the article's metadata, read from what was just saved.
    pub async fn cache(&self, name: &str) -> Result<ArticleMeta, Error> {
        let requests = self.requests(name)?.to_vec();
        let cache = self.db.named(&self.cache_name(name));
        cache.add_all(self.fetcher.clone(), requests).await?;
        tracing::debug!(article = %name, cache = %cache.name(), "article cached");
        self.meta(name).await
    }

    pub async fn is_cached(&self, name: &str) -> Result<bool, Error> {
        self.db.has_cache(&self.cache_name(name)).await
    }

    /// Drop a saved article. Returns false if it was not saved.
    pub async fn uncache(&self, name: &str) -> Result<bool, Error> {
        self.db.delete_cache(&self.cache_name(name)).await
    }

    /// Names of all saved articles.
    pub async fn cached_articles(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .db
            .cache_names()
            .await?
            .into_iter()
            .filter_map(|n| n.strip_prefix(&self.cache_prefix).map(str::to_string))
            .collect())
    }
}
