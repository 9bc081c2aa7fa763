//! `tool enable|disable|auto|info|list|import|export` and `tool whitelist` (spec §6):
//! exercises the Tool Registry (C2).

use clap::Subcommand;
use fleet::{EnabledState, FleetError};

use super::shared::{load_registry, save_registry};

#[derive(Subcommand, Debug)]
pub enum ToolCommand {
    /// List every tool and its effective enabled state.
    List,
    /// Show one tool's schema and metadata.
    Info { name: String },
    /// Enable a tool. `--persist` writes the change to `tools_registry.json`;
    /// otherwise it only applies for the rest of this process's lifetime.
    Enable {
        name: String,
        #[arg(long)]
        persist: bool,
    },
    /// Disable a tool (see `--persist` on `enable`).
    Disable {
        name: String,
        #[arg(long)]
        persist: bool,
    },
    /// Reset a tool to auto-enabled (see `--persist` on `enable`).
    Auto {
        name: String,
        #[arg(long)]
        persist: bool,
    },
    /// Import a tool definition from `<tools_dir>/<name>/config.json`.
    Import { name: String },
    /// Remove a tool from the registry, leaving its on-disk files intact.
    Export { name: String },
    /// Manage a tool's directory whitelist.
    #[command(subcommand)]
    Whitelist(WhitelistCommand),
}

#[derive(Subcommand, Debug)]
pub enum WhitelistCommand {
    /// Add a glob pattern to a tool's whitelist.
    Add { tool: String, pattern: String },
    /// Remove a glob pattern from a tool's whitelist.
    Remove { tool: String, pattern: String },
    /// List a tool's whitelist patterns.
    List { tool: String },
}

pub fn run(cmd: ToolCommand) -> Result<(), FleetError> {
    match cmd {
        ToolCommand::List => list(),
        ToolCommand::Info { name } => info(&name),
        ToolCommand::Enable { name, persist } => set_state(&name, EnabledState::On, persist),
        ToolCommand::Disable { name, persist } => set_state(&name, EnabledState::Off, persist),
        ToolCommand::Auto { name, persist } => set_state(&name, EnabledState::Auto, persist),
        ToolCommand::Import { name } => import(&name),
        ToolCommand::Export { name } => export(&name),
        ToolCommand::Whitelist(sub) => whitelist(sub),
    }
}

fn list() -> Result<(), FleetError> {
    let registry = load_registry()?;
    for tool in registry.list() {
        println!(
            "{:<20} {:<11} {:<14} {}",
            tool.name,
            format!("{:?}", tool.kind),
            format!("{:?}", tool.enabled),
            tool.category
        );
    }
    Ok(())
}

fn info(name: &str) -> Result<(), FleetError> {
    let registry = load_registry()?;
    let tool = registry
        .get(name)
        .ok_or_else(|| fleet::RegistryError::ToolNotFound(name.to_string()))?;
    println!("name:              {}", tool.name);
    println!("kind:              {:?}", tool.kind);
    println!("enabled:           {:?}", tool.enabled);
    println!("requires_approval: {}", tool.requires_approval);
    println!("category:          {}", tool.category);
    println!("whitelist:         {:?}", tool.whitelist);
    println!(
        "schema:            {}",
        serde_json::to_string_pretty(&tool.schema).unwrap_or_default()
    );
    Ok(())
}

fn set_state(name: &str, state: EnabledState, persist: bool) -> Result<(), FleetError> {
    let mut registry = load_registry()?;
    match state {
        EnabledState::On => registry.enable(name, persist)?,
        EnabledState::Off => registry.disable(name, persist)?,
        EnabledState::Auto => registry.set_auto(name, persist)?,
    }
    if persist {
        save_registry(&registry)?;
    }
    println!(
        "fleet: {name} is now {state:?}{}",
        if persist { " (persisted)" } else { " (this session only)" }
    );
    Ok(())
}

fn import(name: &str) -> Result<(), FleetError> {
    let mut registry = load_registry()?;
    registry.import(name)?;
    save_registry(&registry)?;
    println!("fleet: imported {name}");
    Ok(())
}

fn export(name: &str) -> Result<(), FleetError> {
    let mut registry = load_registry()?;
    registry.export(name)?;
    save_registry(&registry)?;
    println!("fleet: exported {name} (registry entry removed, files left in place)");
    Ok(())
}

fn whitelist(cmd: WhitelistCommand) -> Result<(), FleetError> {
    match cmd {
        WhitelistCommand::Add { tool, pattern } => {
            let mut registry = load_registry()?;
            registry.whitelist_add(&tool, &pattern)?;
            save_registry(&registry)?;
            println!("fleet: added {pattern:?} to {tool}'s whitelist");
        }
        WhitelistCommand::Remove { tool, pattern } => {
            let mut registry = load_registry()?;
            registry.whitelist_remove(&tool, &pattern)?;
            save_registry(&registry)?;
            println!("fleet: removed {pattern:?} from {tool}'s whitelist");
        }
        WhitelistCommand::List { tool } => {
            let registry = load_registry()?;
            for pattern in registry.whitelist_list(&tool)? {
                println!("{pattern}");
            }
        }
    }
    Ok(())
}
