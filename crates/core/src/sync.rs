//! Background sync queue.
//!
//! Articles requested while offline are appended to a durable job log. When
//! connectivity returns, [`SyncQueue::drain`] saves every pending article
//! concurrently, notifies for each one that succeeds, and then acknowledges
//! the whole batch it read. Delivery is at-least-once: if the
//! acknowledgement fails, the same jobs run again on the next drain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::Error;
use crate::article::ArticleStore;
use crate::cache::{JobLog, KeyValueStore, SyncJob};
use crate::notify::{Notification, NotificationSink};

/// Key under which older agents kept the job list as a single JSON array.
pub const LEGACY_QUEUE_KEY: &str = "to-bg-cache";

/// Per-job result of a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct JobOutcome {
    pub article_name: String,
    /// Error text if the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one completed drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct DrainReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<JobOutcome>,
}

/// What a drain trigger did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Another drain was already running; nothing was done.
    Busy,
    Completed(DrainReport),
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncQueue<L: JobLog> {
    log: L,
    articles: Arc<ArticleStore>,
    notifier: Arc<dyn NotificationSink>,
    icon: String,
    draining: AtomicBool,
}

impl<L: JobLog> SyncQueue<L> {
    pub fn new(log: L, articles: Arc<ArticleStore>, notifier: Arc<dyn NotificationSink>, icon: &str) -> Self {
        Self { log, articles, notifier, icon: icon.to_string(), draining: AtomicBool::new(false) }
    }

    /// Queue an article for the next drain.
    pub async fn enqueue(&self, article_name: &str) -> Result<SyncJob, Error> {
        self.articles.requests(article_name)?;
        let job = self.log.append(article_name).await?;
        tracing::debug!(seq = job.seq, article = %article_name, "sync job queued");
        Ok(job)
    }

    pub async fn pending(&self) -> Result<Vec<SyncJob>, Error> {
        self.log.pending().await
    }

    /// Move a job list left under [`LEGACY_QUEUE_KEY`] into the log.
    ///
    /// Returns the number of jobs moved.
    pub async fn import_legacy(&self, store: &dyn KeyValueStore) -> Result<usize, Error> {
        let Some(Value::Array(items)) = store.get(LEGACY_QUEUE_KEY).await? else {
            return Ok(0);
        };
        let names: Vec<String> = items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        for name in &names {
            self.log.append(name).await?;
        }
        store.set(LEGACY_QUEUE_KEY, Value::Array(Vec::new())).await?;
        if !names.is_empty() {
            tracing::info!(jobs = names.len(), "imported legacy sync queue");
        }
        Ok(names.len())
    }

    /// Process every pending job, then acknowledge the batch.
    ///
    /// A failing job never stops its siblings or the acknowledgement.
    /// Jobs appended while the drain runs are left for the next one.
    pub async fn drain(&self) -> Result<DrainOutcome, Error> {
        if self.draining.swap(true, Ordering::AcqRel) {
            tracing::debug!("drain already in progress");
            return Ok(DrainOutcome::Busy);
        }
        let _guard = DrainGuard(&self.draining);

        let jobs = self.log.pending().await?;
        let Some(through) = jobs.iter().map(|j| j.seq).max() else {
            return Ok(DrainOutcome::Completed(DrainReport::default()));
        };
        tracing::info!(jobs = jobs.len(), "draining sync queue");

        let mut join_set = JoinSet::new();
        for job in jobs {
            let articles = self.articles.clone();
            let notifier = self.notifier.clone();
            let icon = self.icon.clone();
            join_set.spawn(async move {
                let result = articles.cache(&job.article_name).await.map(|meta| {
                    notifier.show(Notification {
                        title: format!("{} ready!", meta.title),
                        icon,
                        body: "View the article".to_string(),
                        data: meta.url_id,
                    });
                });
                (job, result)
            });
        }

        let mut report = DrainReport::default();
        while let Some(joined) = join_set.join_next().await {
            report.processed += 1;
            match joined {
                Ok((job, Ok(()))) => {
                    report.succeeded += 1;
                    report.outcomes.push(JobOutcome { article_name: job.article_name, error: None });
                }
                Ok((job, Err(e))) => {
                    tracing::warn!(article = %job.article_name, error = %e, "sync job failed");
                    report.failed += 1;
                    report.outcomes.push(JobOutcome { article_name: job.article_name, error: Some(e.to_string()) });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "sync job task failed");
                    report.failed += 1;
                }
            }
        }

        self.log
            .ack_through(through)
            .await
            .map_err(|e| Error::SyncFailed(format!("jobs kept for retry: {e}")))?;

        report.outcomes.sort_by(|a, b| a.article_name.cmp(&b.article_name));
        tracing::info!(succeeded = report.succeeded, failed = report.failed, "sync queue drained");
        Ok(DrainOutcome::Completed(report))
    }
}
