//! MCP tool implementations.
//!
//! Each tool is a plain async function over `OfflineCache` so it can be
//! tested without a transport; the handler only routes to them.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod push;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Pretty JSON text result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::OutputFailed(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
