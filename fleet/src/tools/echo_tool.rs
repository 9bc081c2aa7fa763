//! `echo_tool`: trivial tool used in the default registry and in tests (spec §4.2a).

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_ECHO: &str = "echo_tool";

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        TOOL_ECHO
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_ECHO.to_string(),
            description: Some("Echoes the given message back. Useful for testing.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing text".to_string()))?;
        Ok(ToolCallContent {
            text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_text() {
        let out = EchoTool
            .call(json!({"text": "hello"}), None)
            .await
            .unwrap();
        assert_eq!(out.text, "hello");
    }
}
