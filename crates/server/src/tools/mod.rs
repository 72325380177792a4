//! MCP tool implementations.
//!
//! This module contains all tools exposed by the wikioffline agent server.
//! Each tool answers with its output serialized as pretty JSON text.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod search;
pub mod sync;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use wikioffline_core::Error;

pub use cache::cache_list_impl;
pub use fetch::{AgentFetchParams, fetch_impl};
pub use lifecycle::{AgentMessageParams, activate_impl, install_impl, message_impl};
pub use search::{WikiSearchParams, search_impl};
pub use sync::{NotificationClickParams, SyncEnqueueParams, drain_impl, enqueue_impl, notification_click_impl};

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::Serialization(format!("Failed to serialize tool output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
