mod echo_tool;
mod file_access;
mod shell_exec;
#[path = "trait.rs"]
mod r#trait;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use echo_tool::{EchoTool, TOOL_ECHO};
pub use file_access::{FileAccessMode, FileAccessTool, TOOL_FILE_ACCESS};
pub use r#trait::Tool;
pub use shell_exec::{ShellExecTool, TOOL_SHELL_EXEC};

use crate::dispatcher::ToolDispatcher;
use crate::registry::{EnabledState, GlobalConfig, ToolKind, ToolRegistryDocument, Tool as RegistryTool, ToolRegistry};

/// Builds a [`ToolDispatcher`] with one concrete implementation per tool known to this
/// workspace, wired up with that tool's *current* per-entry whitelist/approval metadata from
/// `registry`. Tools the registry lists but that this binary has no builtin for are skipped -
/// `invoke` then reports them as not found, matching an unregistered tool.
///
/// Shared by `fleet-cli` (rebuilt once per process) and `fleet-serve` (rebuilt per request, so
/// whitelist/approval edits made via `tool whitelist` take effect without a restart).
pub fn build_dispatcher(registry: &ToolRegistry, root_dir: &Path) -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new();
    for entry in registry.list() {
        let tool: Arc<dyn Tool> = match entry.name.as_str() {
            TOOL_FILE_ACCESS => Arc::new(FileAccessTool::new(
                root_dir.to_path_buf(),
                FileAccessMode::ReadWrite,
                entry.whitelist.clone(),
                entry.requires_approval,
            )),
            TOOL_SHELL_EXEC => Arc::new(ShellExecTool::default()),
            TOOL_ECHO => Arc::new(EchoTool),
            _ => continue,
        };
        dispatcher.register(tool);
    }
    dispatcher
}

fn builtin_entry(tool: &dyn Tool, requires_approval: bool) -> RegistryTool {
    let spec = tool.spec();
    RegistryTool {
        name: spec.name,
        kind: ToolKind::LlmInvokable,
        schema: spec.input_schema,
        enabled: EnabledState::Auto,
        category: spec.description.unwrap_or_default(),
        dependencies: Vec::new(),
        requires_approval,
        whitelist: Vec::new(),
        directory: String::new(),
        created_date: None,
        last_modified: None,
    }
}

/// Seeds a fresh [`ToolRegistryDocument`] from the builtin tools this workspace ships
/// (`file_access`, `shell_exec`, `echo_tool`), used when no `tools_registry.json` exists yet
/// (grounded in `tools_manager.py`'s `_get_default_registry` fallback-on-missing-file).
///
/// `file_access` and `shell_exec` default to `requires_approval=true` since an empty whitelist
/// otherwise leaves them fully open (spec §4.3 step 3); `echo_tool` is harmless and defaults to
/// no approval gate.
pub fn default_registry_document() -> ToolRegistryDocument {
    ToolRegistryDocument {
        version: "1.0".to_string(),
        last_updated: None,
        global_config: GlobalConfig {
            require_approval: false,
            sensitive_operations: vec![
                "file_write".to_string(),
                "file_delete".to_string(),
                "command_exec".to_string(),
            ],
        },
        tools: vec![
            builtin_entry(&FileAccessTool::new(PathBuf::new(), FileAccessMode::ReadWrite, Vec::new(), true), true),
            builtin_entry(&ShellExecTool::default(), true),
            builtin_entry(&EchoTool, false),
        ],
    }
}
