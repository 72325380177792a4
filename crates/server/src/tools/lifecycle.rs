//! agent_install, agent_activate and agent_message tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wikioffline_core::version::InstallReport;
use wikioffline_core::{Agent, AgentMessage, LifecycleState};

use super::json_result;

/// Parameters for the agent_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentMessageParams {
    /// Command for the pending agent version. Only "skipWaiting" is understood.
    pub message: String,
}

/// Output shared by the lifecycle tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LifecycleOutput {
    /// Lifecycle state after the trigger ran.
    pub state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallReport>,
    /// Stale caches removed by activation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted_caches: Vec<String>,
}

/// Implementation of the agent_install tool.
pub async fn install_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let report = agent.on_install().await?;
    json_result(&LifecycleOutput {
        state: agent.lifecycle().state(),
        install: Some(report),
        deleted_caches: Vec::new(),
    })
}

/// Implementation of the agent_activate tool.
pub async fn activate_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let deleted_caches = agent.on_activate().await?;
    json_result(&LifecycleOutput { state: agent.lifecycle().state(), install: None, deleted_caches })
}

/// Implementation of the agent_message tool.
pub async fn message_impl(agent: &Agent, params: AgentMessageParams) -> Result<CallToolResult, McpError> {
    let message: AgentMessage = params.message.parse()?;
    let state = agent.on_message(message).await?;
    json_result(&LifecycleOutput { state, install: None, deleted_caches: Vec::new() })
}
