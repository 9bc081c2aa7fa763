//! Loading/saving helpers shared by the `server` and `tool` subcommands.

use config::Config;
use fleet::{default_registry_document, FleetError, ToolRegistry};

use crate::paths;

pub fn load_config() -> Result<Config, FleetError> {
    Ok(Config::load(&paths::config_path())?)
}

/// Loads the tool registry, seeding it from the builtin tools on first run (no
/// `tools_registry.json` yet) rather than erroring - matching `Config`'s own tolerance for a
/// not-yet-initialized on-disk document.
pub fn load_registry() -> Result<ToolRegistry, FleetError> {
    let path = paths::registry_path();
    if path.exists() {
        Ok(ToolRegistry::load(&path, paths::tools_dir())?)
    } else {
        let registry = ToolRegistry::new(default_registry_document(), paths::tools_dir());
        save_registry(&registry)?;
        Ok(registry)
    }
}

pub fn load_all() -> Result<(Config, ToolRegistry), FleetError> {
    Ok((load_config()?, load_registry()?))
}

pub fn save_registry(registry: &ToolRegistry) -> Result<(), FleetError> {
    let path = paths::registry_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(config::ConfigError::Write)?;
    }
    Ok(registry.save(&path)?)
}
