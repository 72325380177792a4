//! cache_list tool implementation.
//!
//! Reports what the agent holds: caches, saved articles and pending jobs,
//! along with the lifecycle signals the host has seen.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::Serialize;
use wikioffline_core::{Agent, LifecycleSignal, LifecycleState, SyncJob};

use super::json_result;
use crate::host::HostPrompt;

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheListOutput {
    pub state: LifecycleState,
    /// Whether a version has ever taken control.
    pub has_controller: bool,
    /// All cache names, oldest first.
    pub caches: Vec<String>,
    /// Articles saved for offline reading.
    pub articles: Vec<String>,
    pub pending_jobs: Vec<SyncJob>,
    /// Update, offline-ready and reload signals, oldest first.
    pub signals: Vec<LifecycleSignal>,
}

/// Implementation of the cache_list tool.
pub async fn cache_list_impl(agent: &Agent, prompt: &HostPrompt) -> Result<CallToolResult, McpError> {
    let output = CacheListOutput {
        state: agent.lifecycle().state(),
        has_controller: agent.has_controller().await?,
        caches: agent.cache_names().await?,
        articles: agent.articles().cached_articles().await?,
        pending_jobs: agent.pending_jobs().await?,
        signals: prompt.signals(),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikioffline_core::UpdateCoordinator;

    use crate::tools::testing::{harness, output};

    #[tokio::test]
    async fn test_cache_list_after_sync() {
        let h = harness().await;
        h.agent.on_install().await.unwrap();
        h.agent.on_activate().await.unwrap();
        h.agent.on_enqueue("Cat").await.unwrap();
        h.agent.on_sync().await.unwrap();
        h.agent.on_enqueue("Dog").await.unwrap();

        let listed = output(&cache_list_impl(&h.agent, &h.prompt).await.unwrap());
        assert_eq!(listed["state"], "activated");
        assert_eq!(listed["has_controller"], true);
        assert_eq!(listed["caches"], serde_json::json!(["wikioffline-static-v20", "wikioffline-article-Cat"]));
        assert_eq!(listed["articles"], serde_json::json!(["Cat"]));
        assert_eq!(listed["pending_jobs"][0]["article_name"], "Dog");
        assert_eq!(listed["signals"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_cache_list_reports_coordinator_signals() {
        let h = harness().await;
        let coordinator = UpdateCoordinator::new(h.agent.has_previous_controller().await.unwrap());
        let task = tokio::spawn(coordinator.run(h.agent.lifecycle().subscribe(), h.prompt.clone(), h.agent.clone()));

        h.agent.on_install().await.unwrap();
        h.agent.on_activate().await.unwrap();
        for _ in 0..50 {
            if !h.prompt.signals().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        task.abort();

        let listed = output(&cache_list_impl(&h.agent, &h.prompt).await.unwrap());
        assert_eq!(listed["signals"], serde_json::json!(["offline_ready"]));
    }
}
