//! The offline agent: every subsystem wired to its trigger inputs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::Error;
use crate::article::ArticleStore;
use crate::cache::{CacheDb, KeyValueStore, SyncJob};
use crate::config::AppConfig;
use crate::lifecycle::{AgentMessage, LifecycleState, WorkerLifecycle, WorkerPort};
use crate::manifest::Manifest;
use crate::net::{Fetcher, Request, Response};
use crate::notify::{NotificationSink, deep_link};
use crate::prefetch::PrefetchTable;
use crate::router::Interceptor;
use crate::search::{SearchController, SearchView, WikiSearch};
use crate::sync::{DrainOutcome, SyncQueue};
use crate::version::{InstallReport, VersionManager};

/// Key/value record naming the static cache of the active version.
pub const CONTROLLER_KEY: &str = "controller";

pub struct Agent {
    origin: Url,
    manifest: Manifest,
    db: CacheDb,
    versions: Arc<VersionManager>,
    interceptor: Interceptor,
    articles: Arc<ArticleStore>,
    sync: SyncQueue<CacheDb>,
    lifecycle: WorkerLifecycle,
    search: SearchController,
}

impl Agent {
    pub fn new(
        config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>, notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let version = config.cache_version();

        let versions = Arc::new(VersionManager::new(db.clone(), version.clone(), origin.clone(), fetcher.clone()));
        let interceptor = Interceptor::new(
            origin.clone(),
            &config.manifest,
            db.clone(),
            versions.clone(),
            fetcher.clone(),
            Arc::new(PrefetchTable::new()),
            config.prefetch_timeout(),
        )?;
        let articles = Arc::new(ArticleStore::new(db.clone(), fetcher.clone(), origin.clone(), &version));
        let sync = SyncQueue::new(db.clone(), articles.clone(), notifier, &config.notification_icon);
        let search = SearchController::new(Arc::new(WikiSearch::new(fetcher, &origin)?), config.search_debounce());

        Ok(Self {
            origin,
            manifest: config.manifest.clone(),
            db,
            versions,
            interceptor,
            articles,
            sync,
            lifecycle: WorkerLifecycle::new(),
            search,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn lifecycle(&self) -> &WorkerLifecycle {
        &self.lifecycle
    }

    pub fn articles(&self) -> &ArticleStore {
        &self.articles
    }

    /// Whether some version already took control, in this process or an earlier one.
    pub async fn has_controller(&self) -> Result<bool, Error> {
        Ok(self.db.get(CONTROLLER_KEY).await?.is_some())
    }

    /// Whether a different version is in control, making this install an update.
    ///
    /// A restart at the version that already controls is not an update.
    pub async fn has_previous_controller(&self) -> Result<bool, Error> {
        let current = self.versions.version().name();
        Ok(match self.db.get(CONTROLLER_KEY).await? {
            Some(controller) => controller.as_str() != Some(current.as_str()),
            None => false,
        })
    }

    /// Install trigger: populate the static cache.
    ///
    /// On failure the lifecycle stays at `installing` so the version can
    /// never activate with a partial cache.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let state = self.lifecycle.state();
        if state != LifecycleState::Installing {
            return Err(Error::InvalidTransition {
                from: state.to_string(),
                to: LifecycleState::Installed.to_string(),
            });
        }

        let report = self.versions.install(&self.manifest).await?;
        self.lifecycle.advance(LifecycleState::Installed)?;
        if self.has_previous_controller().await? && !self.lifecycle.skip_waiting_requested() {
            self.lifecycle.advance(LifecycleState::Waiting)?;
        }
        Ok(report)
    }

    /// Activate trigger: sweep stale caches and take control.
    ///
    /// Returns the names of the deleted caches.
    pub async fn on_activate(&self) -> Result<Vec<String>, Error> {
        if self.lifecycle.state() != LifecycleState::Activating {
            self.lifecycle.advance(LifecycleState::Activating)?;
        }

        let deleted = self.versions.sweep().await?;
        self.sync.import_legacy(&self.db).await?;
        self.db
            .set(CONTROLLER_KEY, Value::String(self.versions.version().name()))
            .await?;
        self.lifecycle.advance(LifecycleState::Activated)?;
        Ok(deleted)
    }

    /// Message trigger. `skipWaiting` activates a pending update at once.
    ///
    /// An update that was told to skip waiting before it installed stops at
    /// `installed`, so that state activates too.
    pub async fn on_message(&self, message: AgentMessage) -> Result<LifecycleState, Error> {
        match message {
            AgentMessage::SkipWaiting => {
                self.lifecycle.request_skip_waiting();
                let activate = match self.lifecycle.state() {
                    LifecycleState::Waiting => true,
                    LifecycleState::Installed => self.has_previous_controller().await?,
                    _ => false,
                };
                if activate {
                    self.on_activate().await?;
                }
            }
        }
        Ok(self.lifecycle.state())
    }

    /// Fetch trigger.
    pub async fn on_fetch(&self, request: &Request) -> Result<Response, Error> {
        self.interceptor.handle(request).await
    }

    /// Connectivity-restored trigger.
    pub async fn on_sync(&self) -> Result<DrainOutcome, Error> {
        self.sync.drain().await
    }

    /// Defer an article until connectivity returns.
    pub async fn on_enqueue(&self, article_name: &str) -> Result<SyncJob, Error> {
        self.sync.enqueue(article_name).await
    }

    pub async fn pending_jobs(&self) -> Result<Vec<SyncJob>, Error> {
        self.sync.pending().await
    }

    /// Page to open for a clicked notification.
    pub fn notification_click(&self, data: &str) -> Result<Url, Error> {
        deep_link(&self.origin, data)
    }

    /// Feed one search input and return the view afterwards.
    pub async fn search(&self, term: &str) -> SearchView {
        self.search.on_input(term).await;
        self.search.view()
    }

    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.db.cache_names().await
    }
}

#[async_trait]
impl WorkerPort for Agent {
    async fn post_message(&self, message: AgentMessage) -> Result<(), Error> {
        self.on_message(message).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::lifecycle::{LifecycleSignal, UpdateCoordinator};
    use crate::manifest::ManifestEntry;
    use crate::net::CredentialsMode;
    use crate::net::testing::FakeOrigin;
    use crate::notify::testing::RecordingSink;

    const ORIGIN: &str = "http://localhost:8000";

    fn config(version: u32) -> AppConfig {
        AppConfig {
            cache_version: version,
            search_debounce_ms: 0,
            manifest: Manifest::new(vec![
                ManifestEntry::new("/"),
                ManifestEntry::with_credentials("/shell.html", CredentialsMode::Include),
                ManifestEntry::new("/css/wiki.css"),
            ]),
            ..AppConfig::default()
        }
    }

    fn online() -> FakeOrigin {
        FakeOrigin::new()
            .route("http://localhost:8000/", "<home>")
            .route("http://localhost:8000/shell.html", "<shell>")
            .route("http://localhost:8000/css/wiki.css", "body{}")
            .route("http://localhost:8000/wiki/Cat.json", r#"{"title":"Cat","urlId":"Cat"}"#)
            .route("http://localhost:8000/wiki/Cat.inc", "<p>meow</p>")
    }

    fn agent(version: u32, db: &CacheDb, fake: FakeOrigin) -> (Agent, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let agent = Agent::new(&config(version), db.clone(), Arc::new(fake), sink.clone()).unwrap();
        (agent, sink)
    }

    fn agent_offline(db: &CacheDb) -> (Agent, Arc<RecordingSink>) {
        agent(20, db, FakeOrigin::new())
    }

    fn request(path: &str) -> Request {
        Request::parse(&format!("{ORIGIN}{path}")).unwrap()
    }

    #[tokio::test]
    async fn test_first_install_and_activate() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (agent, _) = agent(20, &db, online());
        assert!(!agent.has_controller().await.unwrap());

        let report = agent.on_install().await.unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(agent.lifecycle().state(), LifecycleState::Installed);

        agent.on_activate().await.unwrap();
        assert_eq!(agent.lifecycle().state(), LifecycleState::Activated);
        assert_eq!(db.get(CONTROLLER_KEY).await.unwrap(), Some(json!("wikioffline-static-v20")));

        let home = agent.on_fetch(&request("/")).await.unwrap();
        assert_eq!(home.text(), "<home>");
    }

    #[tokio::test]
    async fn test_update_waits_until_skip_waiting() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (old, _) = agent(19, &db, online());
        old.on_install().await.unwrap();
        old.on_activate().await.unwrap();

        let (new, _) = agent(20, &db, online());
        new.on_install().await.unwrap();
        assert_eq!(new.lifecycle().state(), LifecycleState::Waiting);
        assert!(db.has_cache("wikioffline-static-v19").await.unwrap());

        let state = new.on_message(AgentMessage::SkipWaiting).await.unwrap();
        assert_eq!(state, LifecycleState::Activated);
        assert_eq!(new.cache_names().await.unwrap(), vec!["wikioffline-static-v20"]);
    }

    #[tokio::test]
    async fn test_skip_waiting_before_install_skips_waiting_state() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set(CONTROLLER_KEY, json!("wikioffline-static-v19")).await.unwrap();
        let (agent, _) = agent(20, &db, online());

        agent.on_message(AgentMessage::SkipWaiting).await.unwrap();
        agent.on_install().await.unwrap();
        assert_eq!(agent.lifecycle().state(), LifecycleState::Installed);

        let mut coordinator = UpdateCoordinator::new(agent.has_previous_controller().await.unwrap());
        assert_eq!(coordinator.observe(LifecycleState::Installed), Some(LifecycleSignal::UpdateAvailable));

        // the confirmed update posts skipWaiting again
        let state = agent.on_message(AgentMessage::SkipWaiting).await.unwrap();
        assert_eq!(state, LifecycleState::Activated);
        assert_eq!(db.get(CONTROLLER_KEY).await.unwrap(), Some(json!("wikioffline-static-v20")));
    }

    #[tokio::test]
    async fn test_skip_waiting_on_first_install_waits_for_activate() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (agent, _) = agent(20, &db, online());
        agent.on_install().await.unwrap();

        let state = agent.on_message(AgentMessage::SkipWaiting).await.unwrap();
        assert_eq!(state, LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_same_version_restart_is_not_an_update() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (first, _) = agent(20, &db, online());
        first.on_install().await.unwrap();
        first.on_activate().await.unwrap();
        drop(first);

        let (restarted, _) = agent(20, &db, online());
        assert!(restarted.has_controller().await.unwrap());
        assert!(!restarted.has_previous_controller().await.unwrap());

        restarted.on_install().await.unwrap();
        assert_eq!(restarted.lifecycle().state(), LifecycleState::Installed);
        let mut coordinator = UpdateCoordinator::new(restarted.has_previous_controller().await.unwrap());
        assert_eq!(coordinator.observe(LifecycleState::Installed), None);
    }

    #[tokio::test]
    async fn test_failed_install_blocks_activation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fake = FakeOrigin::new().route("http://localhost:8000/", "<home>");
        let (agent, _) = agent(20, &db, fake);

        assert!(matches!(agent.on_install().await, Err(Error::InstallFailed { .. })));
        assert_eq!(agent.lifecycle().state(), LifecycleState::Installing);
        assert!(matches!(agent.on_activate().await, Err(Error::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_page_request_serves_shell_and_prefetches_data() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (agent, _) = agent(20, &db, online());
        agent.on_install().await.unwrap();
        agent.on_activate().await.unwrap();

        let page = agent.on_fetch(&request("/wiki/Cat")).await.unwrap();
        assert_eq!(page.text(), "<shell>");

        let data = agent.on_fetch(&request("/wiki/Cat.json")).await.unwrap();
        assert!(data.text().contains("\"Cat\""));
    }

    #[tokio::test]
    async fn test_synced_article_is_served_offline() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (agent, sink) = agent(20, &db, online());
        agent.on_install().await.unwrap();
        agent.on_activate().await.unwrap();

        agent.on_enqueue("Cat").await.unwrap();
        assert!(matches!(agent.on_sync().await.unwrap(), DrainOutcome::Completed(r) if r.succeeded == 1));
        assert_eq!(sink.titles(), vec!["Cat ready!"]);
        let data = sink.shown.lock().unwrap()[0].data.clone();
        assert_eq!(agent.notification_click(&data).unwrap().as_str(), "http://localhost:8000/wiki/Cat");

        let (offline, _) = agent_offline(&db);
        offline.on_install().await.unwrap();
        assert_eq!(offline.on_fetch(&request("/wiki/Cat")).await.unwrap().text(), "<shell>");
        assert_eq!(offline.on_fetch(&request("/wiki/Cat.inc")).await.unwrap().text(), "<p>meow</p>");
    }

    #[tokio::test]
    async fn test_search_through_agent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fake = online().route(
            "http://localhost:8000/search.json?s=cat",
            r#"[{"title":"Cat","urlId":"Cat"}]"#,
        );
        let (agent, _) = agent(20, &db, fake);

        assert!(matches!(agent.search("cat").await, SearchView::Results { hits } if hits.len() == 1));
        assert_eq!(agent.search("").await, SearchView::Hidden);
        assert!(matches!(agent.search("dog").await, SearchView::Failed { .. }));
    }
}
