//! Aggregating error type for `fleet`.
//!
//! Each component (registry, dispatcher, supervisor, health, memory gate, router, chat
//! pipeline) has its own `thiserror` enum; `FleetError` wraps them so callers at the
//! crate boundary (CLI, HTTP handlers) can match one type.

use thiserror::Error;

use crate::chat::PipelineError;
use crate::dispatcher::DispatchError;
use crate::health::HealthError;
use crate::memory_gate::MemoryGateError;
use crate::registry::RegistryError;
use crate::router::RouterError;
use crate::supervisor::SupervisorError;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Health(#[from] HealthError),
    #[error(transparent)]
    MemoryGate(#[from] MemoryGateError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Chat(#[from] PipelineError),
}
