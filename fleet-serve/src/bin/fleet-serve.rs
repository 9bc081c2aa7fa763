//! `fleet-serve` binary: loads env/config the same way `fleet-cli` does, initializes tracing
//! to stdout (a daemon has no "keep stdout clean" constraint the CLI does), and runs the
//! HTTP server until the process is killed.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper_util=off"));
    let layer = tracing_subscriber::fmt::layer().with_filter(filter);
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_and_apply("fleet", None) {
        eprintln!("fleet-serve: config load failed: {e}");
        std::process::exit(2);
    }
    init_logging();

    let addr = std::env::var("FLEET_SERVE_ADDR").ok();
    if let Err(e) = fleet_serve::serve(addr.as_deref()).await {
        tracing::error!(error = %e, "fleet-serve exited with error");
        std::process::exit(1);
    }
}
