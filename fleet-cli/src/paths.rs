//! Resolves the on-disk locations `fleet` reads/writes: config file, tool registry, tool
//! import directory, and the supervisor's process-log cache directory.
//!
//! Each has an env override; otherwise they default under `$XDG_CONFIG_HOME/fleet` (falling
//! back to `~/.config/fleet` via the `dirs` crate, matching `config::load_and_apply`'s own XDG
//! convention) and `$XDG_CACHE_HOME/fleet` respectively.

use std::path::PathBuf;

fn config_home() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleet")
}

/// `FLEET_CONFIG`, or `<config_home>/config.toml`.
pub fn config_path() -> PathBuf {
    std::env::var_os("FLEET_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_home().join("config.toml"))
}

/// `FLEET_REGISTRY`, or `<config_home>/tools_registry.json`.
pub fn registry_path() -> PathBuf {
    std::env::var_os("FLEET_REGISTRY")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_home().join("tools_registry.json"))
}

/// `FLEET_TOOLS_DIR`, or `<config_home>/tools` (holds `<name>/config.json` for `tool import`).
pub fn tools_dir() -> PathBuf {
    std::env::var_os("FLEET_TOOLS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_home().join("tools"))
}

/// `FLEET_CACHE_DIR`, or `<cache_home>/fleet` (backend process logs, spec §6 `server_log_path`).
pub fn cache_dir() -> PathBuf {
    std::env::var_os("FLEET_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("fleet")
        })
}

/// Root directory `file_access` resolves relative paths against: `FLEET_WORKING_DIR`, or cwd.
pub fn working_dir() -> PathBuf {
    std::env::var_os("FLEET_WORKING_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
