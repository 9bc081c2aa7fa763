//! # fleet
//!
//! Supervises local `llama-server` backends, routes OpenAI-compatible chat requests
//! between local and remote endpoints, and dispatches tool calls for the models it serves.
//!
//! ## Components
//!
//! - [`registry`]: Tool Registry (C2) — on-disk document of tool specs, enabled state
//!   (Off/On/Auto), whitelist, and approval policy.
//! - [`dispatcher`]: Tool Dispatcher (C3) — validates arguments, checks whitelist/dangerous
//!   targets, and executes a tool with a bounded timeout.
//! - [`supervisor`]: Process Supervisor (C4) — starts, stops, adopts, and reconciles local
//!   backend processes.
//! - [`health`]: Health Prober (C5) — probes a backend's `/health` endpoint.
//! - [`memory_gate`]: Memory Safety Gate (C6) — estimates a backend's working set and denies
//!   starts that would exceed the available-memory budget.
//! - [`router`]: Endpoint Router (C7) — resolves the active backend to a concrete
//!   base URL/API key/model identifier.
//! - [`chat`]: Streaming Chat Pipeline (C8) — drives one multi-turn chat request, streaming
//!   tokens and interleaving tool dispatch.
//! - [`xml_adapter`]: XML Tool Adapter (C9) — recovers tool calls a model emitted as inline
//!   `<function=...>` markup instead of a native tool-call delta.
//! - [`openai_sse`]: OpenAI-compatible request/response/chunk DTOs and the upstream HTTP
//!   client used by the chat pipeline.
//! - [`tools`]: Concrete [`tools::Tool`] implementations shipped with this workspace
//!   (`file_access`, `shell_exec`, `echo_tool`).
//! - [`message`]: [`message::Message`] and [`message::ToolCall`], the conversation shape
//!   shared by the chat pipeline, the dispatcher, and the CLI.
//! - [`error`]: [`error::FleetError`], the crate-root error aggregate.
//!
//! `fleet-cli` and `fleet-serve` both build on this crate; neither owns business logic of
//! its own beyond argument parsing / HTTP framing.

pub mod chat;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod memory_gate;
pub mod message;
pub mod openai_sse;
pub mod registry;
pub mod router;
pub mod supervisor;
pub mod tool_source;
pub mod tools;
pub mod xml_adapter;

pub use chat::{ChatPipeline, PipelineError, MAX_TOOL_ROUNDS};
pub use dispatcher::{DispatchError, ToolDispatcher, ToolResult};
pub use error::FleetError;
pub use health::{probe, HealthError, Readiness};
pub use memory_gate::{estimate_working_set, MemoryGateError};
pub use message::{Message, ToolCall};
pub use registry::{
    EnabledState, GlobalConfig, RegistryError, Tool as RegistryTool, ToolKind, ToolRegistry,
    ToolRegistryDocument,
};
pub use router::{resolve, BackendSource, ResolvedEndpoint, RouterError};
pub use supervisor::{ProcessState, ServerProcess, Supervisor, SupervisorError};
pub use tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
pub use tools::{
    build_dispatcher, default_registry_document, EchoTool, FileAccessMode, FileAccessTool,
    ShellExecTool, Tool, TOOL_ECHO, TOOL_FILE_ACCESS, TOOL_SHELL_EXEC,
};
pub use xml_adapter::{contains_xml_function_call, parse_xml_tool_calls};

/// When running `cargo test -p fleet`, initializes tracing from `RUST_LOG` so that unit
/// tests can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
