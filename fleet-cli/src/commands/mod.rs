//! CLI subcommand implementations: `server` (C4/C7/C1), `tool` (C2), and `ask`/`chat` (C8).

pub mod chat;
pub mod server;
pub mod shared;
pub mod tool;
