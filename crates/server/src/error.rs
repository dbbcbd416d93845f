//! Structured errors for tool input handling.
//!
//! Failures from the cache itself arrive as `orc_core::Error` and convert
//! on their own; these cover what the server rejects before reaching it.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., unparseable URL, unknown method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The tool output could not be encoded.
    #[error("OUTPUT_FAILED: {0}")]
    OutputFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::OutputFailed(msg) => (-32000, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
