//! `file_access` tool: read, write, and list files under a whitelist (spec §4.2a).
//!
//! Reads and directory listing are allowed for any whitelisted path, writes additionally require
//! `mode == "rw"`, and writes to a dangerous path are refused unless `require_approval`
//! is set (the caller, not this tool, owns the approval flow - refusal here just surfaces
//! the reason to the model).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_FILE_ACCESS: &str = "file_access";

const MAX_READ_BYTES: u64 = 10 * 1024 * 1024;

/// Patterns that always require approval for writes, regardless of the whitelist.
const DANGEROUS_PATTERNS: &[&str] = &[
    "/etc/*",
    "/sys/*",
    "/proc/*",
    "/dev/*",
    "/boot/*",
    "/root/*",
    "*.key",
    "*.pem",
    "*credentials*",
    "*password*",
    "*.env",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileAccessMode {
    ReadOnly,
    ReadWrite,
}

/// Glob-style match good enough for whitelist/dangerous-path patterns: `*` matches any
/// run of characters, everything else matches literally. No `?`/`[...]` support, matching
/// the small pattern vocabulary the tool's config actually uses.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => {
                if helper(&p[1..], t) {
                    return true;
                }
                !t.is_empty() && helper(p, &t[1..])
            }
            Some(c) => t.first() == Some(c) && helper(&p[1..], &t[1..]),
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

fn is_whitelisted(path: &Path, whitelist: &[String], root_dir: &Path) -> bool {
    if whitelist.is_empty() {
        return false;
    }
    let path_str = path.to_string_lossy();
    for pattern in whitelist {
        if pattern.contains('/') {
            let resolved = if Path::new(pattern).is_absolute() {
                pattern.clone()
            } else {
                root_dir.join(pattern).to_string_lossy().into_owned()
            };
            if glob_match(&resolved, &path_str) {
                return true;
            }
            if let Some(dir) = resolved.strip_suffix("/*") {
                if path_str.starts_with(dir) {
                    return true;
                }
            }
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if glob_match(pattern, name) {
                return true;
            }
        }
    }
    false
}

fn is_dangerous(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    DANGEROUS_PATTERNS
        .iter()
        .any(|pattern| glob_match(pattern, &path_str))
}

/// Read/write/list files rooted at `root_dir`, gated by `whitelist` glob patterns.
pub struct FileAccessTool {
    root_dir: PathBuf,
    mode: FileAccessMode,
    whitelist: Vec<String>,
    require_approval: bool,
}

impl FileAccessTool {
    pub fn new(
        root_dir: PathBuf,
        mode: FileAccessMode,
        whitelist: Vec<String>,
        require_approval: bool,
    ) -> Self {
        Self {
            root_dir,
            mode,
            whitelist,
            require_approval,
        }
    }

    fn resolve(&self, path_str: &str) -> PathBuf {
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    fn check_permission(&self, operation: &str, path: &Path) -> Result<(), ToolSourceError> {
        if !is_whitelisted(path, &self.whitelist, &self.root_dir) {
            return Err(ToolSourceError::PermissionDenied(format!(
                "path {:?} is not whitelisted",
                path
            )));
        }
        match operation {
            "read" | "list" => Ok(()),
            "write" => {
                if self.mode != FileAccessMode::ReadWrite {
                    return Err(ToolSourceError::PermissionDenied(
                        "write requires file_access mode \"rw\"".to_string(),
                    ));
                }
                if is_dangerous(path) && !self.require_approval {
                    return Err(ToolSourceError::PermissionDenied(format!(
                        "write to dangerous path {:?} requires approval",
                        path
                    )));
                }
                Ok(())
            }
            other => Err(ToolSourceError::InvalidInput(format!(
                "unknown operation: {other}"
            ))),
        }
    }
}

#[async_trait]
impl Tool for FileAccessTool {
    fn name(&self) -> &str {
        TOOL_FILE_ACCESS
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_FILE_ACCESS.to_string(),
            description: Some(
                "Read or write files with whitelist validation. Use 'read' to read file \
                 contents, 'write' to write/create a file, 'list' to list a directory."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["read", "write", "list"]
                    },
                    "path": {
                        "type": "string",
                        "description": "Relative to the configured root, or absolute."
                    },
                    "content": {
                        "type": "string",
                        "description": "Required for write."
                    }
                },
                "required": ["operation", "path"]
            }),
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing operation".to_string()))?;
        let path_str = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let path = self.resolve(path_str);
        self.check_permission(operation, &path)?;

        match operation {
            "read" => {
                if !path.exists() {
                    return Err(ToolSourceError::InvalidInput(format!(
                        "file not found: {}",
                        path.display()
                    )));
                }
                if !path.is_file() {
                    return Err(ToolSourceError::InvalidInput(format!(
                        "not a file: {}",
                        path.display()
                    )));
                }
                let meta = std::fs::metadata(&path)
                    .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
                if meta.len() > MAX_READ_BYTES {
                    return Err(ToolSourceError::InvalidInput(format!(
                        "file too large: {} bytes (max {})",
                        meta.len(),
                        MAX_READ_BYTES
                    )));
                }
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
                Ok(ToolCallContent { text: content })
            }
            "write" => {
                let content = args
                    .get("content")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ToolSourceError::InvalidInput("content required for write".to_string())
                    })?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
                }
                std::fs::write(&path, content)
                    .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
                Ok(ToolCallContent {
                    text: format!("wrote {} bytes to {}", content.len(), path.display()),
                })
            }
            "list" => {
                if !path.is_dir() {
                    return Err(ToolSourceError::InvalidInput(format!(
                        "not a directory: {}",
                        path.display()
                    )));
                }
                let mut entries: Vec<String> = std::fs::read_dir(&path)
                    .map_err(|e| ToolSourceError::Transport(e.to_string()))?
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect();
                entries.sort();
                Ok(ToolCallContent {
                    text: entries.join("\n"),
                })
            }
            other => Err(ToolSourceError::InvalidInput(format!(
                "unknown operation: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_basic() {
        assert!(glob_match("*.txt", "a.txt"));
        assert!(!glob_match("*.txt", "a.rs"));
        assert!(glob_match("/etc/*", "/etc/passwd"));
    }

    #[tokio::test]
    async fn read_outside_whitelist_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let tool = FileAccessTool::new(
            dir.path().to_path_buf(),
            FileAccessMode::ReadOnly,
            vec!["b.txt".to_string()],
            false,
        );
        let err = tool
            .call(json!({"operation": "read", "path": "a.txt"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn read_whitelisted_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let tool = FileAccessTool::new(
            dir.path().to_path_buf(),
            FileAccessMode::ReadOnly,
            vec!["*.txt".to_string()],
            false,
        );
        let out = tool
            .call(json!({"operation": "read", "path": "a.txt"}), None)
            .await
            .unwrap();
        assert_eq!(out.text, "hi");
    }

    #[tokio::test]
    async fn write_in_readonly_mode_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileAccessTool::new(
            dir.path().to_path_buf(),
            FileAccessMode::ReadOnly,
            vec!["*.txt".to_string()],
            false,
        );
        let err = tool
            .call(
                json!({"operation": "write", "path": "a.txt", "content": "x"}),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn write_to_dangerous_path_without_approval_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileAccessTool::new(
            dir.path().to_path_buf(),
            FileAccessMode::ReadWrite,
            vec!["*.env".to_string()],
            false,
        );
        let err = tool
            .call(
                json!({"operation": "write", "path": ".env", "content": "x"}),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn list_directory_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let tool = FileAccessTool::new(
            dir.path().to_path_buf(),
            FileAccessMode::ReadOnly,
            vec!["*".to_string()],
            false,
        );
        let out = tool
            .call(json!({"operation": "list", "path": "."}), None)
            .await
            .unwrap();
        assert_eq!(out.text, "a.txt");
    }
}
