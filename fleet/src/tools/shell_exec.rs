//! `shell_exec` tool: run a shell command with a bounded timeout (spec §4.2a).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tokio::time::timeout;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_SHELL_EXEC: &str = "shell_exec";

const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Runs `command` through `/bin/sh -c`, capped at `timeout_secs` (default 30s).
pub struct ShellExecTool {
    default_timeout: Duration,
}

impl ShellExecTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for ShellExecTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn truncate(mut s: String) -> String {
    if s.len() > MAX_OUTPUT_BYTES {
        s.truncate(MAX_OUTPUT_BYTES);
        s.push_str("\n... (truncated)");
    }
    s
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        TOOL_SHELL_EXEC
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_SHELL_EXEC.to_string(),
            description: Some("Run a shell command and return its stdout/stderr.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "args": { "type": "array", "items": { "type": "string" } },
                    "timeout_secs": { "type": "integer", "minimum": 1, "maximum": 300 }
                },
                "required": ["command"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing command".to_string()))?;
        let extra_args: Vec<String> = args
            .get("args")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let full_command = if extra_args.is_empty() {
            command.to_string()
        } else {
            format!("{command} {}", extra_args.join(" "))
        };
        let limit = args
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .map(|s| s.clamp(1, 300))
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&full_command)
            .output();

        let output = timeout(limit, child)
            .await
            .map_err(|_| ToolSourceError::Timeout(limit))?
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            text.push_str("\n--- stderr ---\n");
            text.push_str(&stderr);
        }
        if !output.status.success() {
            text.push_str(&format!("\n--- exit status: {} ---", output.status));
        }
        Ok(ToolCallContent {
            text: truncate(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let tool = ShellExecTool::default();
        let out = tool
            .call(json!({"command": "echo hi"}), None)
            .await
            .unwrap();
        assert_eq!(out.text.trim(), "hi");
    }

    #[tokio::test]
    async fn times_out_long_running_command() {
        let tool = ShellExecTool::new(Duration::from_millis(50));
        let err = tool
            .call(json!({"command": "sleep 2"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::Timeout(_)));
    }
}
