//! wiki_search tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wikioffline_core::Agent;

use super::json_result;

/// Input parameters for wiki_search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WikiSearchParams {
    /// Current contents of the search box. Empty hides the results.
    #[serde(default)]
    pub term: String,
}

/// Implementation of the wiki_search tool.
///
/// Calls racing each other resolve in input order: a call superseded by a
/// newer one returns whatever the newer call left in the view.
pub async fn search_impl(agent: &Agent, params: WikiSearchParams) -> Result<CallToolResult, McpError> {
    let view = agent.search(&params.term).await;
    json_result(&view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{harness, output};

    #[tokio::test]
    async fn test_search_results() {
        let h = harness().await;
        let result = search_impl(&h.agent, WikiSearchParams { term: "cat".into() }).await.unwrap();
        let view = output(&result);
        assert_eq!(view["view"], "results");
        assert_eq!(view["hits"][0]["urlId"], "Cat");
        assert_eq!(view["hits"][0]["snippet"], "a small carnivore");
    }

    #[tokio::test]
    async fn test_empty_term_hides() {
        let h = harness().await;
        let result = search_impl(&h.agent, WikiSearchParams::default()).await.unwrap();
        assert_eq!(output(&result)["view"], "hidden");
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let h = harness().await;
        h.server.reset().await;
        let result = search_impl(&h.agent, WikiSearchParams { term: "cat".into() }).await.unwrap();
        let view = output(&result);
        assert_eq!(view["view"], "failed");
        assert_eq!(view["message"], "Search failed");
    }
}
