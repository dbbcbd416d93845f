//! cache_push tool implementation.
//!
//! Delivers a push message as if it had arrived from the push service.

use orc_client::{OfflineCache, PushPayload};
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;
use crate::error::ToolError;

/// Implementation of the cache_push tool.
pub async fn push_impl(cache: &OfflineCache, payload: PushPayload) -> Result<CallToolResult, McpError> {
    if payload.title.trim().is_empty() {
        return Err(ToolError::InvalidInput("title cannot be empty".into()).into());
    }

    let notification = cache.push(payload).await;
    json_result(&notification)
}
