//! Shared tool types: a `ToolSpec` (name/description/JSON schema) advertised to the
//! model, `ToolCallContent` (a tool's result text), and `ToolSourceError`.

pub mod context;

pub use context::ToolCallContext;

use serde::Serialize;
use thiserror::Error;

/// Description of a tool surfaced to the model (mirrors MCP `tools/list` entries).
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Result text returned from a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallContent {
    pub text: String,
}

/// Errors raised while executing a tool.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("tool timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
}
