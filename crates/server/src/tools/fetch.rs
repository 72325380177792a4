//! agent_fetch tool implementation.
//!
//! Routes one request through the agent's interceptor, exactly as a page
//! on the origin would issue it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wikioffline_client::resolve;
use wikioffline_core::{Agent, CredentialsMode, Error, Request};

use super::json_result;

/// Parameters for the agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// Absolute URL, or a path resolved against the origin (e.g. "/wiki/Cat").
    pub url: String,

    /// Credentials mode: omit, same-origin (default), include.
    #[serde(default)]
    pub credentials: CredentialsMode,
}

/// Output from the agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchOutput {
    pub url: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Response body as text (lossy UTF-8).
    pub body: String,
}

/// Implementation of the agent_fetch tool.
pub async fn fetch_impl(agent: &Agent, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(agent.origin(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = Request::new(url).with_credentials(params.credentials);

    let response = agent.on_fetch(&request).await?;
    json_result(&AgentFetchOutput {
        body: response.text(),
        url: response.url,
        status: response.status,
        content_type: response.content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{harness, output};

    fn params(url: &str) -> AgentFetchParams {
        AgentFetchParams { url: url.into(), credentials: CredentialsMode::default() }
    }

    #[tokio::test]
    async fn test_root_is_cache_only() {
        let h = harness().await;
        let err = fetch_impl(&h.agent, params("/")).await.unwrap_err();
        assert_eq!(err.code.0, -32001);

        h.agent.on_install().await.unwrap();
        let result = fetch_impl(&h.agent, params("/")).await.unwrap();
        assert_eq!(output(&result)["body"], "<home>");
    }

    #[tokio::test]
    async fn test_page_then_data() {
        let h = harness().await;
        h.agent.on_install().await.unwrap();

        let page = fetch_impl(&h.agent, params("/wiki/Cat")).await.unwrap();
        assert_eq!(output(&page)["body"], "<shell>");

        let data = fetch_impl(&h.agent, params("/wiki/Cat.inc")).await.unwrap();
        assert_eq!(output(&data)["body"], "<p>meow</p>");
    }

    #[tokio::test]
    async fn test_bad_scheme() {
        let h = harness().await;
        let err = fetch_impl(&h.agent, params("file:///etc/passwd")).await.unwrap_err();
        assert_eq!(err.code.0, -32003);
    }
}
