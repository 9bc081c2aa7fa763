//! Typed, file-backed Config Store (spec §4.1 / C1).
//!
//! A single TOML document describing the backend fleet, the active endpoint selection, and
//! the tool-execution mode. Accepts both the current multi-backend shape and the legacy
//! single-backend `[default_llm]` shape (promoted into a synthetic `"default"` backend on
//! load); `save` always writes the current shape.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the Config Store (spec §7: `ConfigInvalid`).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Read(std::io::Error),
    #[error("write config: {0}")]
    Write(std::io::Error),
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config invalid: {0}")]
    Invalid(String),
    #[error("backend not found: {0}")]
    BackendNotFound(String),
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Arbitrary key/value options passed verbatim to the `llama-server` binary's command line.
pub type ServerParams = BTreeMap<String, String>;

/// A supervised local backend or a remote OpenAI-compatible API (spec §3 `Backend`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,
    #[serde(flatten)]
    pub kind: BackendKind,
    /// Seconds, must be >= 1 (spec §9 open question: 0/negative is a load-time validation error).
    #[serde(default = "default_healthcheck_interval")]
    pub healthcheck_interval: u64,
    #[serde(default)]
    pub auto_start: bool,
}

fn default_healthcheck_interval() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    Local {
        #[serde(default = "default_host")]
        host: String,
        port: u16,
        binary_path: PathBuf,
        model_dir: PathBuf,
        weights_file: PathBuf,
        #[serde(default)]
        server_params: ServerParams,
    },
    Remote {
        api_base_url: String,
        api_key: String,
        model_name: String,
    },
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Backend {
    pub fn is_local(&self) -> bool {
        matches!(self.kind, BackendKind::Local { .. })
    }

    /// `http://host:port/v1` for Local backends; `api_base_url` verbatim for Remote.
    pub fn api_base_url(&self) -> String {
        match &self.kind {
            BackendKind::Local { host, port, .. } => format!("http://{host}:{port}/v1"),
            BackendKind::Remote { api_base_url, .. } => api_base_url.clone(),
        }
    }

    /// Sentinel key for Local (llama-server does not check it); the configured key for Remote.
    pub fn api_key(&self) -> String {
        match &self.kind {
            BackendKind::Local { .. } => "sk-local".to_string(),
            BackendKind::Remote { api_key, .. } => api_key.clone(),
        }
    }

    pub fn port(&self) -> Option<u16> {
        match &self.kind {
            BackendKind::Local { port, .. } => Some(*port),
            BackendKind::Remote { .. } => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_name(&self.name) {
            return Err(ConfigError::Invalid(format!(
                "backend name {:?} must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        if self.healthcheck_interval < 1 {
            return Err(ConfigError::Invalid(format!(
                "backend {:?}: healthcheck_interval must be >= 1",
                self.name
            )));
        }
        if let BackendKind::Local { binary_path, .. } = &self.kind {
            if binary_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend {:?}: binary_path is required for a Local backend",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// The selected serving mode for the next chat request (spec §3 `EndpointSelection`).
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointSelection {
    LocalDefault(String),
    Remote {
        api_base_url: String,
        api_key: String,
        model_name: String,
    },
}

/// Tool-execution mode (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionMode {
    #[default]
    SinglePass,
    DualPassWriteOnly,
    DualPassAll,
}

/// Raw `[llm_endpoint]` table shape as persisted on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EndpointTable {
    #[serde(default)]
    api_base_url: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    default_local_server: Option<String>,
    #[serde(default)]
    tool_execution_mode: ToolExecutionMode,
}

/// Legacy `[default_llm]` table (single-backend configs predating multi-server support).
#[derive(Debug, Clone, Deserialize)]
struct LegacyDefaultLlm {
    model_name: String,
    gguf_file: String,
    #[serde(default)]
    server_host: Option<String>,
    #[serde(default)]
    server_port: Option<u16>,
    #[serde(default)]
    llama_server_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    local_llm_servers: Vec<Backend>,
    #[serde(default)]
    llm_endpoint: EndpointTable,
    #[serde(default)]
    model_dir: PathBuf,
    #[serde(default)]
    cache_dir: PathBuf,
    #[serde(default)]
    default_llm: Option<LegacyDefaultLlm>,
}

/// On-disk persisted shape (no legacy table: `save` always writes the current form).
#[derive(Debug, Clone, Serialize)]
struct PersistedConfig<'a> {
    local_llm_servers: &'a [Backend],
    llm_endpoint: EndpointTable,
    model_dir: &'a Path,
    cache_dir: &'a Path,
}

/// The typed Config Store: backend fleet, active endpoint, tool-execution mode.
#[derive(Debug, Clone)]
pub struct Config {
    backends: Vec<Backend>,
    default_local_server: Option<String>,
    remote: Option<(String, String, String)>,
    tool_execution_mode: ToolExecutionMode,
    pub model_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Config {
    /// Loads and validates a config document. Accepts the legacy `[default_llm]` shape,
    /// promoting it into a synthetic `"default"` Local backend.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::parse(&text)
    }

    /// Parses a config document from a string (used by `load` and by tests).
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut file: ConfigFile = toml::from_str(text)?;

        if let Some(legacy) = file.default_llm.take() {
            if file.local_llm_servers.iter().any(|b| b.name == "default") {
                return Err(ConfigError::Invalid(
                    "legacy [default_llm] conflicts with an explicit \"default\" backend"
                        .to_string(),
                ));
            }
            let host = legacy.server_host.unwrap_or_else(default_host);
            let port = legacy.server_port.unwrap_or(8000);
            let binary_path = legacy
                .llama_server_path
                .unwrap_or_else(|| PathBuf::from("llama-server"));
            let model_dir = if file.model_dir.as_os_str().is_empty() {
                PathBuf::from("models")
            } else {
                file.model_dir.clone()
            };
            file.local_llm_servers.push(Backend {
                name: "default".to_string(),
                kind: BackendKind::Local {
                    host,
                    port,
                    binary_path,
                    model_dir,
                    weights_file: PathBuf::from(legacy.gguf_file),
                    server_params: ServerParams::default(),
                },
                healthcheck_interval: default_healthcheck_interval(),
                auto_start: false,
            });
            if file.llm_endpoint.default_local_server.is_none()
                && file.llm_endpoint.api_base_url.is_empty()
            {
                file.llm_endpoint.default_local_server = Some("default".to_string());
            }
            let _ = legacy.model_name; // kept only for forward-compat reads; not modeled separately
        }

        let config = Config {
            backends: file.local_llm_servers,
            default_local_server: file.llm_endpoint.default_local_server.filter(|s| !s.is_empty()),
            remote: if file.llm_endpoint.api_base_url.is_empty() {
                None
            } else {
                Some((
                    file.llm_endpoint.api_base_url,
                    file.llm_endpoint.api_key,
                    file.llm_endpoint.model_name,
                ))
            },
            tool_execution_mode: file.llm_endpoint.tool_execution_mode,
            model_dir: file.model_dir,
            cache_dir: file.cache_dir,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_ports: BTreeMap<u16, &str> = BTreeMap::new();
        let mut seen_names: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for b in &self.backends {
            b.validate()?;
            if !seen_names.insert(b.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate backend name {:?}",
                    b.name
                )));
            }
            if let Some(port) = b.port() {
                if let Some(other) = seen_ports.insert(port, b.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "port {port} used by both {:?} and {:?}",
                        other, b.name
                    )));
                }
            }
        }
        if self.default_local_server.is_some() && self.remote.is_some() {
            return Err(ConfigError::Invalid(
                "exactly one endpoint-selection mode may be active at a time (both local_default and remote set)".to_string(),
            ));
        }
        if let Some(name) = &self.default_local_server {
            let found = self
                .backends
                .iter()
                .any(|b| &b.name == name && b.is_local());
            if !found {
                return Err(ConfigError::Invalid(format!(
                    "llm_endpoint.default_local_server {:?} does not name an existing Local backend",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Atomically persists this config to `path`: write a sibling temp file, fsync, rename.
    /// Writes a timestamped backup of the previous file (best-effort) before overwriting.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if path.exists() {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let backup = path.with_extension(format!(
                "{}.bak.{}",
                path.extension().and_then(|e| e.to_str()).unwrap_or("toml"),
                ts
            ));
            let _ = std::fs::copy(path, backup);
        }

        let endpoint = EndpointTable {
            api_base_url: self
                .remote
                .as_ref()
                .map(|(u, _, _)| u.clone())
                .unwrap_or_default(),
            api_key: self
                .remote
                .as_ref()
                .map(|(_, k, _)| k.clone())
                .unwrap_or_default(),
            model_name: self
                .remote
                .as_ref()
                .map(|(_, _, m)| m.clone())
                .unwrap_or_default(),
            default_local_server: self.default_local_server.clone(),
            tool_execution_mode: self.tool_execution_mode,
        };
        let persisted = PersistedConfig {
            local_llm_servers: &self.backends,
            llm_endpoint: endpoint,
            model_dir: &self.model_dir,
            cache_dir: &self.cache_dir,
        };
        let text = toml::to_string_pretty(&persisted)?;

        let tmp_path = path.with_extension("toml.tmp");
        let mut tmp = std::fs::File::create(&tmp_path).map_err(ConfigError::Write)?;
        tmp.write_all(text.as_bytes()).map_err(ConfigError::Write)?;
        tmp.sync_all().map_err(ConfigError::Write)?;
        drop(tmp);
        std::fs::rename(&tmp_path, path).map_err(ConfigError::Write)?;
        Ok(())
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn get_backend(&self, name: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.name == name)
    }

    pub fn tool_execution_mode(&self) -> ToolExecutionMode {
        self.tool_execution_mode
    }

    pub fn set_tool_execution_mode(&mut self, mode: ToolExecutionMode) {
        self.tool_execution_mode = mode;
    }

    pub fn endpoint_selection(&self) -> EndpointSelection {
        if let Some((url, key, model)) = &self.remote {
            return EndpointSelection::Remote {
                api_base_url: url.clone(),
                api_key: key.clone(),
                model_name: model.clone(),
            };
        }
        if let Some(name) = &self.default_local_server {
            return EndpointSelection::LocalDefault(name.clone());
        }
        EndpointSelection::LocalDefault(String::new())
    }

    /// Resolves the active backend: a synthesized Remote if selected, else the Local backend
    /// named by `local_default`, falling back to the sole Local backend if exactly one exists.
    pub fn get_active_backend(&self) -> Result<Backend, ConfigError> {
        if let Some((api_base_url, api_key, model_name)) = &self.remote {
            return Ok(Backend {
                name: "__remote__".to_string(),
                kind: BackendKind::Remote {
                    api_base_url: api_base_url.clone(),
                    api_key: api_key.clone(),
                    model_name: model_name.clone(),
                },
                healthcheck_interval: default_healthcheck_interval(),
                auto_start: false,
            });
        }
        let name = match &self.default_local_server {
            Some(n) if !n.is_empty() => n.clone(),
            _ => {
                let locals: Vec<&Backend> = self.backends.iter().filter(|b| b.is_local()).collect();
                match locals.as_slice() {
                    [only] => return Ok((*only).clone()),
                    [] => return Err(ConfigError::BackendNotFound("(no local backends configured)".into())),
                    _ => {
                        return Err(ConfigError::Invalid(
                            "no default_local_server set and more than one Local backend exists"
                                .to_string(),
                        ))
                    }
                }
            }
        };
        self.get_backend(&name)
            .cloned()
            .ok_or(ConfigError::BackendNotFound(name))
    }

    /// Changes `local_default` to `name`. Errors if the backend does not exist.
    pub fn switch_default(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.backends.iter().any(|b| b.name == name && b.is_local()) {
            return Err(ConfigError::BackendNotFound(name.to_string()));
        }
        self.default_local_server = Some(name.to_string());
        self.remote = None;
        Ok(())
    }

    /// Selects the remote endpoint as active.
    pub fn switch_to_remote(&mut self, api_base_url: String, api_key: String, model_name: String) {
        self.remote = Some((api_base_url, api_key, model_name));
        self.default_local_server = None;
    }

    /// Adds a backend. If the backend is Local with `port == 0`, assigns the smallest free
    /// integer >= the highest existing Local port + 1.
    pub fn add_backend(&mut self, mut backend: Backend) -> Result<(), ConfigError> {
        if self.backends.iter().any(|b| b.name == backend.name) {
            return Err(ConfigError::Invalid(format!(
                "backend {:?} already exists",
                backend.name
            )));
        }
        if let BackendKind::Local { port, .. } = &mut backend.kind {
            if *port == 0 {
                *port = self.next_free_port();
            }
        }
        backend.validate()?;
        self.backends.push(backend);
        self.validate()?;
        Ok(())
    }

    fn next_free_port(&self) -> u16 {
        let used: std::collections::HashSet<u16> =
            self.backends.iter().filter_map(|b| b.port()).collect();
        let highest = used.iter().copied().max().unwrap_or(8000);
        let mut candidate = highest + 1;
        while used.contains(&candidate) {
            candidate += 1;
        }
        candidate
    }

    /// Removes a backend by name. If it was the active local default, clears the selection.
    pub fn remove_backend(&mut self, name: &str) -> Result<(), ConfigError> {
        let before = self.backends.len();
        self.backends.retain(|b| b.name != name);
        if self.backends.len() == before {
            return Err(ConfigError::BackendNotFound(name.to_string()));
        }
        if self.default_local_server.as_deref() == Some(name) {
            self.default_local_server = None;
        }
        Ok(())
    }

    /// Resolves a possibly-relative path against this config's directory, preserving
    /// absolute paths verbatim.
    pub fn resolve_path(config_path: &Path, p: &Path) -> PathBuf {
        if p.is_absolute() {
            return p.to_path_buf();
        }
        config_path
            .parent()
            .map(|dir| dir.join(p))
            .unwrap_or_else(|| p.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
model_dir = "models"
cache_dir = ".cache"

[[local_llm_servers]]
name = "a"
kind = "local"
host = "127.0.0.1"
port = 8001
binary_path = "/usr/local/bin/llama-server"
model_dir = "models"
weights_file = "models/a.gguf"
healthcheck_interval = 5
auto_start = true

[[local_llm_servers]]
name = "b"
kind = "local"
host = "127.0.0.1"
port = 8002
binary_path = "/usr/local/bin/llama-server"
model_dir = "models"
weights_file = "models/b.gguf"
healthcheck_interval = 5

[llm_endpoint]
default_local_server = "a"
tool_execution_mode = "single_pass"
"#
    }

    #[test]
    fn load_parses_multiserver_config() {
        let cfg = Config::parse(sample_toml()).unwrap();
        assert_eq!(cfg.backends().len(), 2);
        assert_eq!(cfg.tool_execution_mode(), ToolExecutionMode::SinglePass);
    }

    #[test]
    fn duplicate_port_is_invalid() {
        let bad = sample_toml().replace("port = 8002", "port = 8001");
        let err = Config::parse(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn get_active_backend_resolves_local_default() {
        let cfg = Config::parse(sample_toml()).unwrap();
        let active = cfg.get_active_backend().unwrap();
        assert_eq!(active.name, "a");
    }

    #[test]
    fn switch_default_then_back_is_idempotent() {
        let mut cfg = Config::parse(sample_toml()).unwrap();
        cfg.switch_default("b").unwrap();
        cfg.switch_default("a").unwrap();
        assert_eq!(cfg.get_active_backend().unwrap().name, "a");
    }

    #[test]
    fn switch_default_unknown_backend_errors() {
        let mut cfg = Config::parse(sample_toml()).unwrap();
        assert!(matches!(
            cfg.switch_default("nope"),
            Err(ConfigError::BackendNotFound(_))
        ));
    }

    #[test]
    fn add_backend_assigns_next_free_port() {
        let mut cfg = Config::parse(sample_toml()).unwrap();
        cfg.add_backend(Backend {
            name: "c".to_string(),
            kind: BackendKind::Local {
                host: "127.0.0.1".to_string(),
                port: 0,
                binary_path: PathBuf::from("/usr/local/bin/llama-server"),
                model_dir: PathBuf::from("models"),
                weights_file: PathBuf::from("models/c.gguf"),
                server_params: ServerParams::default(),
            },
            healthcheck_interval: 5,
            auto_start: false,
        })
        .unwrap();
        let c = cfg.get_backend("c").unwrap();
        assert_eq!(c.port(), Some(8003));
    }

    #[test]
    fn load_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, sample_toml()).unwrap();
        let cfg = Config::load(&path).unwrap();
        cfg.save(&path).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(cfg.backends().len(), reloaded.backends().len());
        assert_eq!(cfg.tool_execution_mode(), reloaded.tool_execution_mode());
        assert_eq!(
            cfg.get_active_backend().unwrap().name,
            reloaded.get_active_backend().unwrap().name
        );
    }

    #[test]
    fn save_writes_backup_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, sample_toml()).unwrap();
        let cfg = Config::load(&path).unwrap();
        cfg.save(&path).unwrap();
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn legacy_default_llm_promoted_to_synthetic_backend() {
        let toml = r#"
model_dir = "models"
cache_dir = ".cache"

[default_llm]
model_name = "Qwen/Qwen2.5-Coder-7B-Instruct-GGUF"
gguf_file = "qwen2.5-coder-7b-instruct-q4_k_m.gguf"
server_host = "127.0.0.1"
server_port = 8000
"#;
        let cfg = Config::parse(toml).unwrap();
        assert_eq!(cfg.backends().len(), 1);
        assert_eq!(cfg.backends()[0].name, "default");
        assert_eq!(cfg.get_active_backend().unwrap().name, "default");
    }

    #[test]
    fn zero_or_negative_healthcheck_interval_is_invalid() {
        let bad = sample_toml().replace("healthcheck_interval = 5", "healthcheck_interval = 0");
        assert!(Config::parse(&bad).is_err());
    }

    #[test]
    fn invalid_name_rejected() {
        let bad = sample_toml().replace("name = \"a\"", "name = \"has a space\"");
        assert!(Config::parse(&bad).is_err());
    }
}
