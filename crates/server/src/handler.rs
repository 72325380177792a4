//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the agent's trigger inputs.
use std::sync::Arc;

use crate::host::{HostNotifier, HostPrompt};
use crate::tools::{
    AgentFetchParams, AgentMessageParams, NotificationClickParams, SyncEnqueueParams, WikiSearchParams,
    activate_impl, cache_list_impl, drain_impl, enqueue_impl, fetch_impl, install_impl, message_impl,
    notification_click_impl, search_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use wikioffline_core::Agent;

/// The main MCP server handler for the offline agent.
#[derive(Clone)]
pub struct AgentServer {
    agent: Arc<Agent>,
    notifier: Arc<HostNotifier>,
    prompt: Arc<HostPrompt>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl AgentServer {
    /// Create a new server handler.
    pub fn new(agent: Arc<Agent>, notifier: Arc<HostNotifier>, prompt: Arc<HostPrompt>) -> Self {
        Self { agent, notifier, prompt, tool_router: Self::tool_router() }
    }

    #[tool(description = "Install trigger. Populates the versioned static cache from the manifest. \
                          On failure the agent stays in 'installing' and cannot activate.")]
    async fn agent_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.agent).await
    }

    #[tool(description = "Activate trigger. Deletes stale static caches (saved articles are kept) \
                          and records this version as the controller.")]
    async fn agent_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.agent).await
    }

    #[tool(description = "Post a message to the pending agent version. 'skipWaiting' activates a waiting version now.")]
    async fn agent_message(&self, params: Parameters<AgentMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.agent, params.0).await
    }

    /// Route one request through the interceptor.
    ///
    /// Root and shell are cache-only; article pages serve the shell and
    /// prefetch their data; data requests take the prefetched response.
    #[tool(description = "Fetch a URL or origin path through the offline agent. Returns status, content type and body.")]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    #[tool(description = "Queue an article to be saved for offline reading when connectivity returns.")]
    async fn sync_enqueue(&self, params: Parameters<SyncEnqueueParams>) -> Result<CallToolResult, McpError> {
        enqueue_impl(&self.agent, params.0).await
    }

    #[tool(description = "Connectivity-restored trigger. Saves every queued article, \
                          returns per-job outcomes and the notifications shown.")]
    async fn sync_drain(&self) -> Result<CallToolResult, McpError> {
        drain_impl(&self.agent, &self.notifier).await
    }

    #[tool(description = "Resolve a clicked notification's data to the article URL to open.")]
    async fn notification_click(&self, params: Parameters<NotificationClickParams>) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.agent, params.0)
    }

    #[tool(description = "Search articles on the origin. Stale results from superseded calls are discarded.")]
    async fn wiki_search(&self, params: Parameters<WikiSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.agent, params.0).await
    }

    #[tool(description = "List caches, saved articles, pending sync jobs, the lifecycle state \
                          and the update/offline-ready/reload signals raised so far.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        cache_list_impl(&self.agent, &self.prompt).await
    }
}

impl ServerHandler for AgentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "wikioffline-agent".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::harness;

    #[tokio::test]
    async fn test_lists_every_tool() {
        let h = harness().await;
        let server = AgentServer::new(h.agent, h.notifier, h.prompt);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "agent_activate",
                "agent_fetch",
                "agent_install",
                "agent_message",
                "cache_list",
                "notification_click",
                "sync_drain",
                "sync_enqueue",
                "wiki_search",
            ]
        );
    }
}
