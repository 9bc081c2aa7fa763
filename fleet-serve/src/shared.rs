//! Loading helpers shared by the chat-completions and models handlers.
//!
//! Config and the tool registry are reloaded from disk on every request rather than cached
//! in [`crate::AppState`], so edits made by a concurrently running `fleet-cli tool enable` /
//! `server switch` take effect on the daemon without a restart - the same tradeoff
//! `fleet::build_dispatcher`'s doc comment calls out for its "rebuilt per request" caller.

use config::Config;
use fleet::{default_registry_document, FleetError, ToolRegistry};

use crate::paths;

pub fn load_config() -> Result<Config, FleetError> {
    Ok(Config::load(&paths::config_path())?)
}

pub fn load_registry() -> Result<ToolRegistry, FleetError> {
    let path = paths::registry_path();
    if path.exists() {
        Ok(ToolRegistry::load(&path, paths::tools_dir())?)
    } else {
        Ok(ToolRegistry::new(default_registry_document(), paths::tools_dir()))
    }
}
