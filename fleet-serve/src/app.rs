//! Axum app: shared state and route table for the OpenAI-compatible HTTP surface (spec §6).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use fleet::Supervisor;

use crate::handlers;

/// State shared across every request. The [`Supervisor`] is the one thing that must live for
/// the daemon's whole lifetime (it owns child-process handles); config and the tool registry
/// are reloaded per request by [`crate::shared`] so CLI-side edits apply without a restart.
/// Each request builds its own `sysinfo::System` snapshot (matching `fleet-cli`'s `server`
/// subcommand) rather than sharing one behind a lock, so a slow chat request never blocks
/// another request's memory-gate check.
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub pipeline: fleet::ChatPipeline,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/models", get(handlers::list_models))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
