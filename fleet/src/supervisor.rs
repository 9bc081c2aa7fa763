//! Process Supervisor (spec §4.4 / C4): starts/stops/adopts `llama-server` child processes,
//! tracks PID/port/readiness, and runs the background reconciliation loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use config::{Backend, BackendKind};

use crate::health::{probe, Readiness};
use crate::memory_gate::{self, MemoryGateError};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend not found: {0}")]
    BackendNotFound(String),
    #[error("backend {0} is not a Local backend")]
    NotLocal(String),
    #[error(transparent)]
    MemoryGateDenied(#[from] MemoryGateError),
    #[error("start timed out for backend {0}")]
    StartTimeout(String),
    #[error("start failed for backend {0}: {1}")]
    StartFailed(String, String),
    #[error("weights file is empty: {0}")]
    EmptyWeightsFile(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Ready,
    Degraded,
    Stopping,
    Stopped,
}

/// Runtime record of one supervised backend (spec §3 `ServerProcess`).
#[derive(Debug, Clone)]
pub struct ServerProcess {
    pub backend_name: String,
    pub pid: u32,
    pub port: u16,
    pub started_at: SystemTime,
    pub state: ProcessState,
    /// False for a process discovered by port probing rather than spawned by this supervisor.
    pub owned: bool,
}

struct Entry {
    info: ServerProcess,
    child: Option<Child>,
    consecutive_health_failures: u32,
}

const START_TIMEOUT: Duration = Duration::from_secs(60);
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Owns every `ServerProcess` record and child-process handle for the process's lifetime.
pub struct Supervisor {
    entries: DashMap<String, Arc<Mutex<Entry>>>,
    client: reqwest::Client,
    cache_dir: PathBuf,
}

impl Supervisor {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            entries: DashMap::new(),
            client: reqwest::Client::new(),
            cache_dir,
        }
    }

    fn entry_for(&self, name: &str) -> Arc<Mutex<Entry>> {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Entry {
                    info: ServerProcess {
                        backend_name: name.to_string(),
                        pid: 0,
                        port: 0,
                        started_at: SystemTime::now(),
                        state: ProcessState::Stopped,
                        owned: false,
                    },
                    child: None,
                    consecutive_health_failures: 0,
                }))
            })
            .clone()
    }

    /// Starts `backend` (spec §4.4 `Start`). `running_weights_bytes` is the weights-file size
    /// of every other currently-Ready Local backend, for the memory gate.
    pub async fn start(
        &self,
        backend: &Backend,
        force: bool,
        system: &sysinfo::System,
        running_weights_bytes: &[u64],
    ) -> Result<ServerProcess, SupervisorError> {
        let BackendKind::Local {
            host,
            port,
            binary_path,
            weights_file,
            server_params,
            ..
        } = &backend.kind
        else {
            return Err(SupervisorError::NotLocal(backend.name.clone()));
        };

        let handle = self.entry_for(&backend.name);
        let mut entry = handle.lock().await;
        if matches!(entry.info.state, ProcessState::Ready | ProcessState::Starting) {
            return Ok(entry.info.clone());
        }

        let weights_meta = std::fs::metadata(weights_file)?;
        if weights_meta.len() == 0 {
            return Err(SupervisorError::EmptyWeightsFile(weights_file.clone()));
        }

        memory_gate::check(system, weights_meta.len(), running_weights_bytes, force)?;

        entry.info.state = ProcessState::Starting;

        match probe(&self.client, host, *port).await {
            Readiness::Ready => {
                let pid = find_pid_by_port_and_binary(*port, binary_path).unwrap_or(0);
                entry.info = ServerProcess {
                    backend_name: backend.name.clone(),
                    pid,
                    port: *port,
                    started_at: SystemTime::now(),
                    state: ProcessState::Ready,
                    owned: false,
                };
                entry.child = None;
                info!(backend = %backend.name, pid, "adopted already-running server");
                return Ok(entry.info.clone());
            }
            Readiness::NotReady | Readiness::Unreachable => {}
        }

        let log_path = self.cache_dir.join(format!("{}.log", backend.name));
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_file = std::fs::File::create(&log_path)?;
        let log_file_err = log_file.try_clone()?;

        let mut cmd = Command::new(binary_path);
        cmd.arg("--host")
            .arg(host)
            .arg("--port")
            .arg(port.to_string())
            .arg("--model")
            .arg(weights_file);
        for (key, value) in server_params {
            cmd.arg(format!("--{key}")).arg(value);
        }
        if let Some(parent) = binary_path.parent() {
            cmd.current_dir(parent);
        }
        cmd.stdout(std::process::Stdio::from(log_file));
        cmd.stderr(std::process::Stdio::from(log_file_err));

        let child = cmd
            .spawn()
            .map_err(|e| SupervisorError::StartFailed(backend.name.clone(), e.to_string()))?;
        let pid = child.id().unwrap_or(0);

        entry.info = ServerProcess {
            backend_name: backend.name.clone(),
            pid,
            port: *port,
            started_at: SystemTime::now(),
            state: ProcessState::Starting,
            owned: true,
        };
        entry.child = Some(child);
        drop(entry);

        let deadline = Instant::now() + START_TIMEOUT;
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if probe(&self.client, host, *port).await == Readiness::Ready {
                let mut entry = handle.lock().await;
                entry.info.state = ProcessState::Ready;
                return Ok(entry.info.clone());
            }
            if Instant::now() >= deadline {
                let mut entry = handle.lock().await;
                if let Some(mut child) = entry.child.take() {
                    let _ = child.kill().await;
                }
                entry.info.state = ProcessState::Stopped;
                return Err(SupervisorError::StartTimeout(backend.name.clone()));
            }
        }
    }

    /// Probes `backend`'s port and, if something is already answering, records an unowned
    /// `ServerProcess` for it without spawning - the same discovery `start` performs before
    /// falling back to spawn, exposed standalone so a short-lived caller (e.g. `fleet-cli
    /// server stop`, which has no entry from a prior `start` in the same process) can learn
    /// about a backend a previous invocation left running. Returns `None` if nothing answers.
    pub async fn adopt(&self, backend: &Backend) -> Option<ServerProcess> {
        let BackendKind::Local {
            host,
            port,
            binary_path,
            ..
        } = &backend.kind
        else {
            return None;
        };
        if probe(&self.client, host, *port).await != Readiness::Ready {
            return None;
        }
        let pid = find_pid_by_port_and_binary(*port, binary_path).unwrap_or(0);
        let handle = self.entry_for(&backend.name);
        let mut entry = handle.lock().await;
        entry.info = ServerProcess {
            backend_name: backend.name.clone(),
            pid,
            port: *port,
            started_at: SystemTime::now(),
            state: ProcessState::Ready,
            owned: false,
        };
        entry.child = None;
        Some(entry.info.clone())
    }

    /// Stops a backend's process, owned or adopted (spec §4.4 `Stop`).
    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let Some(handle) = self.entries.get(name).map(|e| e.clone()) else {
            return Err(SupervisorError::BackendNotFound(name.to_string()));
        };
        let mut entry = handle.lock().await;
        entry.info.state = ProcessState::Stopping;

        if let Some(mut child) = entry.child.take() {
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;
                if let Some(pid) = child.id() {
                    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                }
            }
            let graceful = tokio::time::timeout(STOP_GRACE, child.wait()).await;
            if graceful.is_err() {
                let _ = child.kill().await;
            }
        } else if entry.info.pid != 0 {
            kill_pid(entry.info.pid);
        }

        entry.info.state = ProcessState::Stopped;
        Ok(())
    }

    /// Ready, or Degraded with a recent successful probe (spec §4.4 `IsRunning`).
    pub async fn is_running(&self, name: &str) -> bool {
        match self.entries.get(name) {
            Some(handle) => {
                let entry = handle.clone();
                let entry = entry.lock().await;
                matches!(entry.info.state, ProcessState::Ready | ProcessState::Degraded)
            }
            None => false,
        }
    }

    pub async fn get_running(&self) -> Vec<String> {
        let mut names = Vec::new();
        for entry in self.entries.iter() {
            let guard = entry.value().lock().await;
            if guard.info.state == ProcessState::Ready {
                names.push(guard.info.backend_name.clone());
            }
        }
        names
    }

    pub async fn snapshot(&self, name: &str) -> Option<ServerProcess> {
        let handle = self.entries.get(name)?.clone();
        let entry = handle.lock().await;
        Some(entry.info.clone())
    }

    /// One reconciliation tick for a Ready backend: two consecutive probe failures transition
    /// to Degraded; a success from Degraded returns to Ready (spec §4.4 "Background
    /// reconciliation"). The supervisor never auto-restarts a Degraded backend.
    pub async fn reconcile_once(&self, backend: &Backend) {
        let BackendKind::Local { host, port, .. } = &backend.kind else {
            return;
        };
        let Some(handle) = self.entries.get(&backend.name).map(|e| e.clone()) else {
            return;
        };
        let mut entry = handle.lock().await;
        if !matches!(entry.info.state, ProcessState::Ready | ProcessState::Degraded) {
            return;
        }
        match probe(&self.client, host, *port).await {
            Readiness::Ready => {
                entry.consecutive_health_failures = 0;
                entry.info.state = ProcessState::Ready;
            }
            Readiness::NotReady | Readiness::Unreachable => {
                entry.consecutive_health_failures += 1;
                if entry.consecutive_health_failures >= 2 {
                    warn!(backend = %backend.name, "health probe failed twice, marking Degraded");
                    entry.info.state = ProcessState::Degraded;
                }
            }
        }
    }

    /// Spawns one background reconciliation task for `backend`, probing every
    /// `healthcheck_interval` seconds until the returned handle is dropped/aborted.
    pub fn spawn_reconciliation(self: &Arc<Self>, backend: Backend) -> tokio::task::JoinHandle<()> {
        let supervisor = self.clone();
        let interval = Duration::from_secs(backend.healthcheck_interval.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                supervisor.reconcile_once(&backend).await;
            }
        })
    }
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn kill_pid(_pid: u32) {}

/// Resolves a PID from `port` by scanning the process table for a command line that
/// references both `binary_path`'s file name and the port (spec §4.4 step 3, "this tolerates
/// stale [PID] files and works across restarts of the control plane").
fn find_pid_by_port_and_binary(port: u16, binary_path: &std::path::Path) -> Option<u32> {
    let binary_name = binary_path.file_name()?.to_str()?;
    let port_str = port.to_string();
    let mut system = sysinfo::System::new_all();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    for (pid, process) in system.processes() {
        let cmd = process.cmd().iter().filter_map(|s| s.to_str()).collect::<Vec<_>>().join(" ");
        if cmd.contains(binary_name) && cmd.contains(&port_str) {
            return Some(pid.as_u32());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_refuses_empty_weights_file() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("empty.gguf");
        std::fs::write(&weights, []).unwrap();
        let backend = Backend {
            name: "a".to_string(),
            kind: BackendKind::Local {
                host: "127.0.0.1".to_string(),
                port: 18080,
                binary_path: PathBuf::from("/bin/true"),
                model_dir: dir.path().to_path_buf(),
                weights_file: weights,
                server_params: Default::default(),
            },
            healthcheck_interval: 5,
            auto_start: false,
        };
        let supervisor = Supervisor::new(dir.path().to_path_buf());
        let system = sysinfo::System::new();
        let err = supervisor
            .start(&backend, false, &system, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::EmptyWeightsFile(_)));
    }

    #[tokio::test]
    async fn is_running_false_for_unknown_backend() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(dir.path().to_path_buf());
        assert!(!supervisor.is_running("nope").await);
    }
}
