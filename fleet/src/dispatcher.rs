//! Tool Dispatcher (spec §4.3 / C3): validates arguments, enforces whitelists and approval
//! gates, executes a tool, and normalizes the outcome into a [`ToolResult`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;

use crate::registry::{EnabledState, ToolRegistry};
use crate::tool_source::{ToolCallContext, ToolSourceError};
use crate::tools::Tool;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("invalid arguments: {0}")]
    ArgsInvalid(String),
    #[error("approval required: {0}")]
    ApprovalRequired(String),
}

/// Normalized tool outcome (spec §4.3 step 5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl ToolResult {
    fn ok(text: String) -> Self {
        ToolResult {
            success: true,
            data: Some(Value::String(text)),
            error: None,
            timed_out: false,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        ToolResult {
            success: false,
            data: None,
            error: Some(message.into()),
            timed_out: false,
        }
    }

    fn timed_out(limit: Duration) -> Self {
        ToolResult {
            success: false,
            data: None,
            error: Some(format!("tool timed out after {limit:?}")),
            timed_out: true,
        }
    }
}

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Validates `arguments` against a JSON-Schema-shaped `schema`: required keys, types, enum
/// membership, numeric min/max (spec §4.3 step 2). Supports the subset of JSON Schema the
/// tool schemas in this system actually use (object/string/integer/number/boolean/array).
pub fn validate_args(schema: &Value, arguments: &Value) -> Result<(), DispatchError> {
    let Some(obj) = schema.as_object() else {
        return Ok(());
    };
    let properties = obj.get("properties").and_then(|v| v.as_object());
    let required: Vec<&str> = obj
        .get("required")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let args_obj = arguments
        .as_object()
        .ok_or_else(|| DispatchError::ArgsInvalid("arguments must be an object".to_string()))?;

    for key in &required {
        if !args_obj.contains_key(*key) {
            return Err(DispatchError::ArgsInvalid(format!("missing required field {key:?}")));
        }
    }

    let Some(properties) = properties else {
        return Ok(());
    };
    for (key, value) in args_obj {
        let Some(field_schema) = properties.get(key) else {
            continue;
        };
        validate_one(key, value, field_schema)?;
    }
    Ok(())
}

fn validate_one(key: &str, value: &Value, field_schema: &Value) -> Result<(), DispatchError> {
    if let Some(expected_type) = field_schema.get("type").and_then(|v| v.as_str()) {
        let ok = match expected_type {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !ok {
            return Err(DispatchError::ArgsInvalid(format!(
                "field {key:?} must be of type {expected_type}"
            )));
        }
    }
    if let Some(allowed) = field_schema.get("enum").and_then(|v| v.as_array()) {
        if !allowed.iter().any(|v| v == value) {
            return Err(DispatchError::ArgsInvalid(format!(
                "field {key:?} must be one of {allowed:?}"
            )));
        }
    }
    if let Some(n) = value.as_f64() {
        if let Some(min) = field_schema.get("minimum").and_then(|v| v.as_f64()) {
            if n < min {
                return Err(DispatchError::ArgsInvalid(format!(
                    "field {key:?} below minimum {min}"
                )));
            }
        }
        if let Some(max) = field_schema.get("maximum").and_then(|v| v.as_f64()) {
            if n > max {
                return Err(DispatchError::ArgsInvalid(format!(
                    "field {key:?} above maximum {max}"
                )));
            }
        }
    }
    Ok(())
}

/// Runs registered tools against the registry's policy metadata.
pub struct ToolDispatcher {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Validates, gates, and executes `tool_name(arguments)`; never returns `Err` - all
    /// failures are normalized into `ToolResult` (spec §4.3 "Failure semantics").
    pub async fn invoke(
        &self,
        registry: &ToolRegistry,
        tool_name: &str,
        arguments: Value,
        approved: bool,
        ctx: Option<&ToolCallContext>,
    ) -> ToolResult {
        let Some(entry) = registry.get(tool_name) else {
            return ToolResult::err(DispatchError::ToolNotFound(tool_name.to_string()).to_string());
        };
        if matches!(entry.enabled, EnabledState::Off) {
            return ToolResult::err(DispatchError::ToolNotFound(tool_name.to_string()).to_string());
        }
        if let Err(e) = validate_args(&entry.schema, &arguments) {
            return ToolResult::err(e.to_string());
        }

        let global = registry.global_config();
        let requires_approval = entry.requires_approval || global.require_approval;
        if !entry.whitelist.is_empty() {
            let target = extract_target(&arguments);
            let whitelisted = target
                .as_deref()
                .map(|t| matches_whitelist(t, &entry.whitelist))
                .unwrap_or(false);
            if !whitelisted {
                return ToolResult::err(
                    DispatchError::ApprovalRequired(format!(
                        "{tool_name}: target not in whitelist"
                    ))
                    .to_string(),
                );
            }
            if is_dangerous_target(target.as_deref().unwrap_or("")) && !(requires_approval && approved) {
                return ToolResult::err(
                    DispatchError::ApprovalRequired(format!(
                        "{tool_name}: dangerous target requires explicit approval"
                    ))
                    .to_string(),
                );
            }
        } else if requires_approval && !approved {
            return ToolResult::err(
                DispatchError::ApprovalRequired(format!("{tool_name}: approval required"))
                    .to_string(),
            );
        }

        let Some(tool) = self.tools.get(tool_name) else {
            return ToolResult::err(DispatchError::ToolNotFound(tool_name.to_string()).to_string());
        };

        let limit = timeout_for(tool_name, &arguments);
        match timeout(limit, tool.call(arguments, ctx)).await {
            Ok(Ok(content)) => ToolResult::ok(content.text),
            Ok(Err(e)) => ToolResult::err(format_tool_error(e)),
            Err(_) => ToolResult::timed_out(limit),
        }
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn format_tool_error(e: ToolSourceError) -> String {
    e.to_string()
}

fn timeout_for(tool_name: &str, arguments: &Value) -> Duration {
    if tool_name == "shell_exec" {
        let secs = arguments
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(30)
            .clamp(1, 300);
        return Duration::from_secs(secs);
    }
    DEFAULT_TOOL_TIMEOUT
}

fn extract_target(arguments: &Value) -> Option<String> {
    arguments
        .get("path")
        .or_else(|| arguments.get("command"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

const DANGEROUS_COMMAND_VERBS: &[&str] = &[
    "rm", "dd", "mkfs", "shutdown", "reboot", "format", ":(){ :|:& };:",
];

fn is_dangerous_target(target: &str) -> bool {
    const DANGEROUS_PATH_PREFIXES: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot", "/root"];
    if DANGEROUS_PATH_PREFIXES.iter().any(|p| target.starts_with(p)) {
        return true;
    }
    let first_token = target.split_whitespace().next().unwrap_or("");
    DANGEROUS_COMMAND_VERBS.contains(&first_token)
}

fn matches_whitelist(target: &str, whitelist: &[String]) -> bool {
    whitelist.iter().any(|pattern| {
        if let Some(dir) = pattern.strip_suffix("/*") {
            return target.starts_with(dir);
        }
        glob_eq(pattern, target)
    })
}

fn glob_eq(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => helper(&p[1..], t) || (!t.is_empty() && helper(p, &t[1..])),
            Some(c) => t.first() == Some(c) && helper(&p[1..], &t[1..]),
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{GlobalConfig, Tool, ToolKind, ToolRegistryDocument};
    use crate::tools::EchoTool;
    use serde_json::json;

    fn registry_with_echo(whitelist: Vec<String>, requires_approval: bool) -> ToolRegistry {
        ToolRegistry::new(
            ToolRegistryDocument {
                global_config: GlobalConfig::default(),
                tools: vec![Tool {
                    name: "echo_tool".to_string(),
                    kind: ToolKind::LlmInvokable,
                    schema: json!({
                        "type": "object",
                        "properties": {"text": {"type": "string"}},
                        "required": ["text"]
                    }),
                    enabled: EnabledState::On,
                    category: String::new(),
                    dependencies: vec![],
                    requires_approval,
                    whitelist,
                    directory: String::new(),
                    created_date: None,
                    last_modified: None,
                }],
                ..Default::default()
            },
            std::path::PathBuf::from("/nonexistent"),
        )
    }

    fn dispatcher_with_echo() -> ToolDispatcher {
        let mut d = ToolDispatcher::new();
        d.register(Arc::new(EchoTool));
        d
    }

    #[tokio::test]
    async fn tool_round_trip_scenario() {
        let registry = registry_with_echo(vec![], false);
        let dispatcher = dispatcher_with_echo();
        let result = dispatcher
            .invoke(&registry, "echo_tool", json!({"text": "hi"}), false, None)
            .await;
        assert!(result.success);
        assert_eq!(result.data, Some(Value::String("hi".to_string())));
    }

    #[tokio::test]
    async fn missing_required_arg_is_rejected() {
        let registry = registry_with_echo(vec![], false);
        let dispatcher = dispatcher_with_echo();
        let result = dispatcher
            .invoke(&registry, "echo_tool", json!({}), false, None)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing required field"));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = registry_with_echo(vec![], false);
        let dispatcher = dispatcher_with_echo();
        let result = dispatcher
            .invoke(&registry, "nope", json!({}), false, None)
            .await;
        assert!(!result.success);
    }

    #[test]
    fn whitelist_denial_scenario() {
        assert!(!matches_whitelist("/etc/shadow", &["/tmp/work/*".to_string()]));
        assert!(matches_whitelist("/tmp/work/a.txt", &["/tmp/work/*".to_string()]));
    }

    #[test]
    fn numeric_maximum_boundary() {
        let schema = json!({
            "type": "object",
            "properties": {"n": {"type": "integer", "maximum": 10}},
            "required": ["n"]
        });
        assert!(validate_args(&schema, &json!({"n": 10})).is_ok());
        assert!(validate_args(&schema, &json!({"n": 11})).is_err());
    }
}
