//! Starts every `auto_start` backend and spawns its background reconciliation loop at daemon
//! startup (spec §4.4 "Background reconciliation" / §6 "fleet-serve ... runs the background
//! reconciliation loop").

use std::sync::Arc;

use config::Config;
use fleet::Supervisor;

/// Starts each `auto_start` local backend (best-effort: a failure is logged, not fatal - one
/// misconfigured backend should not stop the daemon from serving the others) and spawns its
/// reconciliation task. Reconciliation handles only hold a single `JoinHandle` each; they are
/// never awaited - they run until the process exits.
pub async fn start_auto_start_backends(supervisor: &Arc<Supervisor>, config: &Config) {
    let system = sysinfo::System::new_all();
    for backend in config.backends() {
        if !backend.auto_start || !backend.is_local() {
            continue;
        }
        match supervisor.start(backend, false, &system, &[]).await {
            Ok(process) => {
                tracing::info!(
                    backend = %backend.name,
                    pid = process.pid,
                    port = process.port,
                    "auto-started backend"
                );
                supervisor.spawn_reconciliation(backend.clone());
            }
            Err(e) => {
                tracing::warn!(backend = %backend.name, error = %e, "auto_start backend failed to start");
            }
        }
    }
}
