//! Tool Registry (spec §4.2 / C2): enumerates known tools, their enable state, whitelists,
//! and dispatch metadata, persisted as a single JSON document (`tools_registry.json`) with a
//! `version`/`last_updated`/`global_config` envelope alongside the per-tool entries.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool_source::ToolSpec;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("read tool registry: {0}")]
    Read(std::io::Error),
    #[error("write tool registry: {0}")]
    Write(std::io::Error),
    #[error("parse tool registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("tool already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid tool definition: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    LlmInvokable,
    PreProcessor,
    PostProcessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnabledState {
    Off,
    On,
    Auto,
}

/// One tool entry in the registry document (spec §3 `Tool`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub kind: ToolKind,
    pub schema: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub enabled: EnabledState,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

fn default_enabled() -> EnabledState {
    EnabledState::Auto
}

impl Tool {
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: (!self.category.is_empty()).then(|| self.category.clone()),
            input_schema: self.schema.clone(),
        }
    }
}

/// Shared default policy consulted when a tool does not set its own `requires_approval`
/// (grounded in `tools_manager.py`'s registry `global_config` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default)]
    pub sensitive_operations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRegistryDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub global_config: GlobalConfig,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ToolRegistryDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_updated: None,
            global_config: GlobalConfig::default(),
            tools: Vec::new(),
        }
    }
}

/// In-memory registry: file-backed document plus a non-persisted session-overrides map
/// (spec §4.2 "Policy: session overrides are never persisted").
pub struct ToolRegistry {
    doc: ToolRegistryDocument,
    session_overrides: HashMap<String, EnabledState>,
    tools_dir: std::path::PathBuf,
}

impl ToolRegistry {
    pub fn new(doc: ToolRegistryDocument, tools_dir: std::path::PathBuf) -> Self {
        Self {
            doc,
            session_overrides: HashMap::new(),
            tools_dir,
        }
    }

    pub fn load(path: &Path, tools_dir: std::path::PathBuf) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(RegistryError::Read)?;
        let doc: ToolRegistryDocument = serde_json::from_str(&text)?;
        Ok(Self::new(doc, tools_dir))
    }

    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let text = serde_json::to_string_pretty(&self.doc)?;
        std::fs::write(path, text).map_err(RegistryError::Write)
    }

    fn effective_state(&self, name: &str) -> Option<EnabledState> {
        self.session_overrides
            .get(name)
            .copied()
            .or_else(|| self.doc.tools.iter().find(|t| t.name == name).map(|t| t.enabled))
    }

    /// All tools, with their effective (session-override-aware) enabled state applied.
    pub fn list(&self) -> Vec<Tool> {
        self.doc
            .tools
            .iter()
            .cloned()
            .map(|mut t| {
                if let Some(state) = self.session_overrides.get(&t.name) {
                    t.enabled = *state;
                }
                t
            })
            .collect()
    }

    pub fn list_by_kind(&self, kind: ToolKind) -> Vec<Tool> {
        self.list().into_iter().filter(|t| t.kind == kind).collect()
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.list().into_iter().find(|t| t.name == name)
    }

    /// Tools that are effectively enabled (On or Auto) and LLM-invokable - what C8 attaches
    /// to the outgoing request.
    pub fn list_enabled_invokable(&self) -> Vec<Tool> {
        self.list()
            .into_iter()
            .filter(|t| t.kind == ToolKind::LlmInvokable)
            .filter(|t| !matches!(t.enabled, EnabledState::Off))
            .collect()
    }

    fn set_state(&mut self, name: &str, state: EnabledState, persistent: bool) -> Result<(), RegistryError> {
        if !self.doc.tools.iter().any(|t| t.name == name) {
            return Err(RegistryError::ToolNotFound(name.to_string()));
        }
        if persistent {
            self.session_overrides.remove(name);
            if let Some(t) = self.doc.tools.iter_mut().find(|t| t.name == name) {
                t.enabled = state;
            }
        } else {
            self.session_overrides.insert(name.to_string(), state);
        }
        Ok(())
    }

    pub fn enable(&mut self, name: &str, persistent: bool) -> Result<(), RegistryError> {
        self.set_state(name, EnabledState::On, persistent)
    }

    pub fn disable(&mut self, name: &str, persistent: bool) -> Result<(), RegistryError> {
        self.set_state(name, EnabledState::Off, persistent)
    }

    pub fn set_auto(&mut self, name: &str, persistent: bool) -> Result<(), RegistryError> {
        self.set_state(name, EnabledState::Auto, persistent)
    }

    /// Removes a session override, restoring file-backed state for one tool.
    pub fn reset(&mut self, name: &str) {
        self.session_overrides.remove(name);
    }

    /// Reads `<tools_dir>/<name>/config.json`, validates, and appends to the registry.
    pub fn import(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.doc.tools.iter().any(|t| t.name == name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        let config_path = self.tools_dir.join(name).join("config.json");
        let text = std::fs::read_to_string(&config_path).map_err(RegistryError::Read)?;
        let tool: Tool = serde_json::from_str(&text)?;
        if tool.name != name {
            return Err(RegistryError::Invalid(format!(
                "config.json name {:?} does not match directory {:?}",
                tool.name, name
            )));
        }
        self.doc.tools.push(tool);
        Ok(())
    }

    /// Removes the registry entry but leaves on-disk files intact.
    pub fn export(&mut self, name: &str) -> Result<Tool, RegistryError> {
        let pos = self
            .doc
            .tools
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;
        self.session_overrides.remove(name);
        Ok(self.doc.tools.remove(pos))
    }

    pub fn whitelist_add(&mut self, name: &str, pattern: &str) -> Result<(), RegistryError> {
        let tool = self
            .doc
            .tools
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;
        if !tool.whitelist.iter().any(|p| p == pattern) {
            tool.whitelist.push(pattern.to_string());
        }
        Ok(())
    }

    pub fn whitelist_remove(&mut self, name: &str, pattern: &str) -> Result<(), RegistryError> {
        let tool = self
            .doc
            .tools
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;
        tool.whitelist.retain(|p| p != pattern);
        Ok(())
    }

    pub fn whitelist_list(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        self.doc
            .tools
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.whitelist.clone())
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.doc.global_config
    }

    pub fn session_override_names(&self) -> HashSet<String> {
        self.session_overrides.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            kind: ToolKind::LlmInvokable,
            schema: json!({"type": "object"}),
            enabled: EnabledState::On,
            category: "test".to_string(),
            dependencies: vec![],
            requires_approval: false,
            whitelist: vec![],
            directory: String::new(),
            created_date: None,
            last_modified: None,
        }
    }

    fn registry_with(tools: Vec<Tool>) -> ToolRegistry {
        ToolRegistry::new(
            ToolRegistryDocument {
                tools,
                ..Default::default()
            },
            std::path::PathBuf::from("/nonexistent"),
        )
    }

    #[test]
    fn disable_is_session_only_by_default() {
        let mut reg = registry_with(vec![sample_tool("a")]);
        reg.disable("a", false).unwrap();
        assert_eq!(reg.get("a").unwrap().enabled, EnabledState::Off);
        reg.reset("a");
        assert_eq!(reg.get("a").unwrap().enabled, EnabledState::On);
    }

    #[test]
    fn persistent_disable_survives_reset() {
        let mut reg = registry_with(vec![sample_tool("a")]);
        reg.disable("a", true).unwrap();
        reg.reset("a");
        assert_eq!(reg.get("a").unwrap().enabled, EnabledState::Off);
    }

    #[test]
    fn import_requires_matching_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(
            dir.path().join("a").join("config.json"),
            serde_json::to_string(&sample_tool("wrong_name")).unwrap(),
        )
        .unwrap();
        let mut reg = registry_with(vec![]);
        reg.tools_dir = dir.path().to_path_buf();
        let err = reg.import("a").unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
    }

    #[test]
    fn import_then_export_restores_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(
            dir.path().join("a").join("config.json"),
            serde_json::to_string(&sample_tool("a")).unwrap(),
        )
        .unwrap();
        let mut reg = registry_with(vec![]);
        reg.tools_dir = dir.path().to_path_buf();
        reg.import("a").unwrap();
        assert!(reg.get("a").is_some());
        reg.export("a").unwrap();
        assert!(reg.get("a").is_none());
    }

    #[test]
    fn whitelist_add_remove_round_trips() {
        let mut reg = registry_with(vec![sample_tool("a")]);
        reg.whitelist_add("a", "/tmp/*").unwrap();
        assert_eq!(reg.whitelist_list("a").unwrap(), vec!["/tmp/*".to_string()]);
        reg.whitelist_remove("a", "/tmp/*").unwrap();
        assert!(reg.whitelist_list("a").unwrap().is_empty());
    }

    #[test]
    fn disabled_tool_excluded_from_enabled_invokable() {
        let mut reg = registry_with(vec![sample_tool("a"), sample_tool("b")]);
        reg.disable("b", true).unwrap();
        let names: Vec<_> = reg.list_enabled_invokable().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a".to_string()]);
    }
}
