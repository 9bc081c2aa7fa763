//! On-disk locations `fleet-serve` reads/writes, mirroring `fleet-cli`'s resolution exactly
//! (same env overrides, same XDG fallback) so a CLI invocation and the daemon agree on where
//! the config file, tool registry, and backend process logs live.

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

/// `FLEET_TOOLS_DIR`, or `<config_home>/tools`.
pub fn tools_dir() -> PathBuf {
    std::env::var_os("FLEET_TOOLS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_home().join("tools"))
}

/// `FLEET_CACHE_DIR`, or `<cache_home>/fleet`.
pub fn cache_dir() -> PathBuf {
    std::env::var_os("FLEET_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("fleet")
        })
}

/// Root directory `file_access` resolves relative paths against.
pub fn working_dir() -> PathBuf {
    std::env::var_os("FLEET_WORKING_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
