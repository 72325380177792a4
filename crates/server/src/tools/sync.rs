//! sync_enqueue, sync_drain and notification_click tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wikioffline_core::{Agent, DrainOutcome, SyncJob};

use super::json_result;
use crate::host::{HostNotifier, ShownNotification};

/// Parameters for the sync_enqueue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncEnqueueParams {
    /// Article name as it appears in `/wiki/<name>`.
    pub article: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SyncEnqueueOutput {
    pub job: SyncJob,
    /// Jobs waiting for the next drain, this one included.
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SyncDrainOutput {
    pub outcome: DrainOutcome,
    /// Notifications shown since the last drain call.
    pub notifications: Vec<ShownNotification>,
}

/// Parameters for the notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// The `data` field of the clicked notification.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NotificationClickOutput {
    /// Page to open.
    pub url: String,
}

/// Implementation of the sync_enqueue tool.
pub async fn enqueue_impl(agent: &Agent, params: SyncEnqueueParams) -> Result<CallToolResult, McpError> {
    let job = agent.on_enqueue(&params.article).await?;
    let pending = agent.pending_jobs().await?.len();
    json_result(&SyncEnqueueOutput { job, pending })
}

/// Implementation of the sync_drain tool.
pub async fn drain_impl(agent: &Agent, notifier: &HostNotifier) -> Result<CallToolResult, McpError> {
    let outcome = agent.on_sync().await?;
    json_result(&SyncDrainOutput { outcome, notifications: notifier.drain() })
}

/// Implementation of the notification_click tool.
pub fn notification_click_impl(agent: &Agent, params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    let url = agent.notification_click(&params.data)?;
    json_result(&NotificationClickOutput { url: url.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{harness, output};

    #[tokio::test]
    async fn test_enqueue_drain_click() {
        let h = harness().await;

        let queued = output(&enqueue_impl(&h.agent, SyncEnqueueParams { article: "Cat".into() }).await.unwrap());
        assert_eq!(queued["pending"], 1);
        assert_eq!(queued["job"]["article_name"], "Cat");

        let drained = output(&drain_impl(&h.agent, &h.notifier).await.unwrap());
        assert_eq!(drained["outcome"]["status"], "completed");
        assert_eq!(drained["outcome"]["succeeded"], 1);
        assert_eq!(drained["notifications"][0]["title"], "Cat ready!");
        assert_eq!(drained["notifications"][0]["body"], "View the article");

        let data = drained["notifications"][0]["data"].as_str().unwrap().to_string();
        let clicked = output(&notification_click_impl(&h.agent, NotificationClickParams { data }).unwrap());
        assert_eq!(clicked["url"], format!("{}/wiki/Cat", h.server.uri()));
    }

    #[tokio::test]
    async fn test_failed_job_reported() {
        let h = harness().await;
        enqueue_impl(&h.agent, SyncEnqueueParams { article: "Missing".into() })
            .await
            .unwrap();

        let drained = output(&drain_impl(&h.agent, &h.notifier).await.unwrap());
        assert_eq!(drained["outcome"]["failed"], 1);
        assert!(drained["notifications"].as_array().unwrap().is_empty());
        assert!(h.agent.pending_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_click_data() {
        let h = harness().await;
        let err = notification_click_impl(&h.agent, NotificationClickParams { data: String::new() }).unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
