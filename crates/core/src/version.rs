//! Versioned static cache management.
//!
//! A [`CacheVersion`] names the static cache (`<prefix>-static-v<version>`).
//! Installing populates it from the manifest; sweeping deletes every other
//! cache carrying this agent's prefix, except the long-lived article caches.
//! The version is injected configuration, never computed.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::Error;
use crate::cache::{CacheDb, NamedCache, fetch_all};
use crate::manifest::Manifest;
use crate::net::Fetcher;

/// Name of one static cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersion {
    prefix: String,
    version: u32,
}

impl CacheVersion {
    pub fn new(prefix: &str, version: u32) -> Self {
        Self { prefix: prefix.to_string(), version }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// `<prefix>-static-v<version>`
    pub fn name(&self) -> String {
        format!("{}-static-v{}", self.prefix, self.version)
    }

    /// Prefix shared by the per-article caches, which sweeps never touch.
    pub fn article_prefix(&self) -> String {
        format!("{}-article-", self.prefix)
    }

    /// Whether a sweep run by this version should delete `name`.
    pub fn is_garbage(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.prefix)) && !name.starts_with(&self.article_prefix()) && name != self.name()
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Summary of a completed install.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub cache_name: String,
    pub fetched: usize,
    pub already_cached: usize,
    pub pruned: u64,
}

/// Owns the static cache for one configured version.
pub struct VersionManager {
    db: CacheDb,
    version: CacheVersion,
    origin: Url,
    fetcher: Arc<dyn Fetcher>,
}

impl VersionManager {
    pub fn new(db: CacheDb, version: CacheVersion, origin: Url, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { db, version, origin, fetcher }
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    /// Handle to the current static cache.
    pub async fn current(&self) -> Result<NamedCache, Error> {
        self.db.open_cache(&self.version.name()).await
    }

    /// Populate the current static cache from the manifest.
    ///
    /// Resources already resident are not refetched. If any resource fails
    /// (network error or non-2xx), nothing from this attempt is written and
    /// `InstallFailed` names the first failing resource; entries written by
    /// earlier attempts stay, which is harmless because a retry installs the
    /// same version name. On success, entries not in the manifest are pruned.
    pub async fn install(&self, manifest: &Manifest) -> Result<InstallReport, Error> {
        let cache = self.current().await?;
        let requests = manifest.requests(&self.origin)?;
        tracing::info!(cache = %self.version, resources = requests.len(), "installing static cache");

        let mut missing = Vec::new();
        for request in &requests {
            if cache.match_request(request).await?.is_none() {
                missing.push(request.clone());
            }
        }
        let already_cached = requests.len() - missing.len();

        let mut fetched = Vec::with_capacity(missing.len());
        let mut first_failure: Option<Error> = None;
        for (request, result) in fetch_all(self.fetcher.clone(), missing).await {
            let reason = match result {
                Ok(response) if response.is_success() => {
                    fetched.push((request, response));
                    continue;
                }
                Ok(response) => format!("status {}", response.status),
                Err(e) => e.to_string(),
            };
            tracing::warn!(resource = %request.url, %reason, "install resource failed");
            first_failure.get_or_insert(Error::InstallFailed { resource: request.url.to_string(), reason });
        }
        if let Some(err) = first_failure {
            return Err(err);
        }

        let fetched_count = fetched.len();
        cache.put_all(fetched).await?;
        let pruned = cache.retain(&requests).await?;

        tracing::info!(cache = %self.version, fetched = fetched_count, already_cached, pruned, "static cache installed");
        Ok(InstallReport { cache_name: self.version.name(), fetched: fetched_count, already_cached, pruned })
    }

    /// Delete stale static caches. Returns the deleted names.
    ///
    /// Safe alongside serving: a read against a deleted cache misses and the
    /// request falls through to the network.
    pub async fn sweep(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.db.cache_names().await? {
            if self.version.is_garbage(&name) && self.db.delete_cache(&name).await? {
                tracing::info!(cache = %name, "deleted stale cache");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;
    use crate::net::testing::FakeOrigin;
    use crate::net::{CredentialsMode, Request, Response};

    const ORIGIN: &str = "http://localhost:8000";

    fn origin() -> Url {
        Url::parse(ORIGIN).unwrap()
    }

    fn manifest() -> Manifest {
        Manifest::new(vec![
            ManifestEntry::new("/"),
            ManifestEntry::with_credentials("/shell.html", CredentialsMode::Include),
            ManifestEntry::new("/css/wiki.css"),
        ])
    }

    fn full_origin() -> FakeOrigin {
        FakeOrigin::new()
            .route("http://localhost:8000/", "home")
            .route("http://localhost:8000/shell.html", "<shell>")
            .route("http://localhost:8000/css/wiki.css", "body{}")
    }

    #[test]
    fn test_cache_version_names() {
        let v = CacheVersion::new("wikioffline", 20);
        assert_eq!(v.name(), "wikioffline-static-v20");
        assert_eq!(v.article_prefix(), "wikioffline-article-");
        assert_eq!(v.to_string(), "wikioffline-static-v20");
    }

    #[test]
    fn test_is_garbage() {
        let v = CacheVersion::new("wikioffline", 20);
        assert!(v.is_garbage("wikioffline-static-v19"));
        assert!(v.is_garbage("wikioffline-anything"));
        assert!(!v.is_garbage("wikioffline-static-v20"));
        assert!(!v.is_garbage("wikioffline-article-Cat"));
        assert!(!v.is_garbage("othersite-static-v1"));
        assert!(!v.is_garbage("wikiofflinex-static-v1"));
    }

    #[tokio::test]
    async fn test_install_contains_exactly_manifest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let vm = VersionManager::new(db, CacheVersion::new("wikioffline", 20), origin(), Arc::new(full_origin()));

        let report = vm.install(&manifest()).await.unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.cache_name, "wikioffline-static-v20");

        let keys = vm.current().await.unwrap().keys().await.unwrap();
        assert_eq!(keys, manifest().requests(&origin()).unwrap());
    }

    #[tokio::test]
    async fn test_install_skips_resident_and_prunes_extras() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fake = Arc::new(full_origin());
        let vm = VersionManager::new(db, CacheVersion::new("wikioffline", 20), origin(), fake.clone());

        let stray = Request::parse("http://localhost:8000/old.js").unwrap();
        vm.current()
            .await
            .unwrap()
            .put(&stray, &Response::ok(stray.url.as_str(), None, "old"))
            .await
            .unwrap();

        vm.install(&manifest()).await.unwrap();
        let report = vm.install(&manifest()).await.unwrap();
        assert_eq!(report.fetched, 0);
        assert_eq!(report.already_cached, 3);
        assert_eq!(fake.fetch_count("http://localhost:8000/css/wiki.css"), 1);

        let keys = vm.current().await.unwrap().keys().await.unwrap();
        assert!(!keys.contains(&stray));
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_install_failure_names_resource() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fake = FakeOrigin::new()
            .route("http://localhost:8000/", "home")
            .route("http://localhost:8000/shell.html", "<shell>")
            .route_status("http://localhost:8000/css/wiki.css", 500);
        let vm = VersionManager::new(db, CacheVersion::new("wikioffline", 20), origin(), Arc::new(fake));

        let err = vm.install(&manifest()).await.unwrap_err();
        assert!(matches!(&err, Error::InstallFailed { resource, reason }
            if resource.ends_with("/css/wiki.css") && reason == "status 500"));
        assert!(vm.current().await.unwrap().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_current_and_articles() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in [
            "wikioffline-static-v18",
            "wikioffline-static-v19",
            "wikioffline-article-Cat",
            "wikioffline-static-v20",
            "unrelated-cache",
        ] {
            db.open_cache(name).await.unwrap();
        }
        let vm = VersionManager::new(db.clone(), CacheVersion::new("wikioffline", 20), origin(), Arc::new(FakeOrigin::new()));

        let deleted = vm.sweep().await.unwrap();
        assert_eq!(deleted, vec!["wikioffline-static-v18", "wikioffline-static-v19"]);
        assert_eq!(
            db.cache_names().await.unwrap(),
            vec!["wikioffline-article-Cat", "wikioffline-static-v20", "unrelated-cache"]
        );
    }

    #[tokio::test]
    async fn test_two_versions_in_one_db() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = VersionManager::new(db.clone(), CacheVersion::new("wikioffline", 19), origin(), Arc::new(full_origin()));
        let new = VersionManager::new(db.clone(), CacheVersion::new("wikioffline", 20), origin(), Arc::new(full_origin()));

        old.install(&manifest()).await.unwrap();
        new.install(&manifest()).await.unwrap();
        new.sweep().await.unwrap();

        assert_eq!(db.cache_names().await.unwrap(), vec!["wikioffline-static-v20"]);
    }
}
