//! `fleet` CLI binary (spec §6): `server` (C1/C4/C5/C7), `tool` (C2), `chat`/`ask` (C8).

mod commands;
mod exit;
mod log_format;
mod logging;
mod paths;

use clap::{Parser, Subcommand};
use commands::chat::ChatArgs;
use commands::server::ServerCommand;
use commands::tool::ToolCommand;

#[derive(Parser, Debug)]
#[command(name = "fleet")]
#[command(about = "Local LLM backend control plane: start/stop backends, manage tools, chat")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage local/remote backend processes.
    #[command(subcommand)]
    Server(ServerCommand),
    /// Manage the tool registry and whitelists.
    #[command(subcommand)]
    Tool(ToolCommand),
    /// Ask one question (non-streaming), or start an interactive streaming session.
    Chat(ChatArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_and_apply("fleet", None) {
        eprintln!("fleet: config load failed: {e}");
        std::process::exit(exit::EXIT_CONFIG);
    }
    if let Err(e) = logging::init() {
        eprintln!("fleet: logging init failed: {e}");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Server(cmd) => commands::server::run(cmd).await,
        Command::Tool(cmd) => commands::tool::run(cmd),
        Command::Chat(args) => commands::chat::run(args).await,
    };

    if let Err(e) = result {
        std::process::exit(exit::report(&e));
    }
}
