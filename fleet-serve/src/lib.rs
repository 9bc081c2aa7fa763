//! Long-lived daemon exposing an OpenAI-compatible `/v1/chat/completions` HTTP surface over
//! the same Supervisor/Registry/Dispatcher/Router stack `fleet-cli` drives one-shot (spec §6
//! "fleet-serve ... consumes and re-exposes an OpenAI-compatible surface").
//!
//! **Public API**: [`serve`], [`serve_on_listener`].

mod app;
mod error;
mod handlers;
mod paths;
mod reconcile;
mod shared;
mod sse;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use app::AppState;

const DEFAULT_ADDR: &str = "127.0.0.1:8085";

/// Builds the shared app state: a fresh `Supervisor` for this process's lifetime, the
/// auto-started backends' reconciliation loops, and the chat pipeline's HTTP client.
async fn build_state() -> Result<Arc<AppState>, fleet::FleetError> {
    let config = shared::load_config()?;
    let supervisor = Arc::new(fleet::Supervisor::new(paths::cache_dir()));
    reconcile::start_auto_start_backends(&supervisor, &config).await;

    Ok(Arc::new(AppState {
        supervisor,
        pipeline: fleet::ChatPipeline::new(reqwest::Client::new()),
    }))
}

/// Runs the HTTP server on an existing listener. Used by tests (bind to `127.0.0.1:0`, then
/// read back the assigned port via [`TcpListener::local_addr`]).
pub async fn serve_on_listener(
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("fleet-serve listening on http://{addr}");

    let state = build_state().await?;
    let router = app::router(state);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Runs the HTTP server, binding `addr` (default `127.0.0.1:8085`).
pub async fn serve(addr: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(listener).await
}
