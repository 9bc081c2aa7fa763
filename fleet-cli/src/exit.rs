//! Maps a [`fleet::FleetError`] to the single-sentence summary, stable machine tag, and exit
//! code the CLI surface promises (spec §6/§7: "every surfaced error carries a single-sentence
//! human summary and a stable machine tag for scripting").

use config::ConfigError;
use fleet::{DispatchError, FleetError, PipelineError, RegistryError, RouterError, SupervisorError};

/// Exit code for a user-visible failure (spec §6: "1 user-visible failure with message").
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a configuration error (spec §6: "2 configuration error").
pub const EXIT_CONFIG: i32 = 2;

/// Prints `err`'s summary to stderr (with its machine tag) and returns the exit code the
/// process should use.
pub fn report(err: &FleetError) -> i32 {
    let (summary, tag, code) = describe(err);
    eprintln!("fleet: {summary} [{tag}]");
    code
}

fn describe(err: &FleetError) -> (String, &'static str, i32) {
    match err {
        FleetError::Config(e) => describe_config(e),
        FleetError::Registry(e) => describe_registry(e),
        FleetError::Dispatch(e) => describe_dispatch(e),
        FleetError::Supervisor(e) => describe_supervisor(e),
        FleetError::Health(e) => (e.to_string(), "health_unreachable", EXIT_FAILURE),
        FleetError::MemoryGate(e) => (e.to_string(), "memory_gate_denied", EXIT_FAILURE),
        FleetError::Router(RouterError::Config(e)) => describe_config(e),
        FleetError::Chat(e) => describe_pipeline(e),
    }
}

fn describe_config(e: &ConfigError) -> (String, &'static str, i32) {
    let tag = match e {
        ConfigError::BackendNotFound(_) => "backend_not_found",
        _ => "config_invalid",
    };
    (e.to_string(), tag, EXIT_CONFIG)
}

fn describe_registry(e: &RegistryError) -> (String, &'static str, i32) {
    let tag = match e {
        RegistryError::ToolNotFound(_) => "tool_not_found",
        RegistryError::AlreadyExists(_) => "tool_already_exists",
        _ => "tool_registry_invalid",
    };
    (e.to_string(), tag, EXIT_FAILURE)
}

fn describe_dispatch(e: &DispatchError) -> (String, &'static str, i32) {
    let tag = match e {
        DispatchError::ToolNotFound(_) => "tool_not_found",
        DispatchError::ArgsInvalid(_) => "args_invalid",
        DispatchError::ApprovalRequired(_) => "approval_required",
    };
    (e.to_string(), tag, EXIT_FAILURE)
}

fn describe_supervisor(e: &SupervisorError) -> (String, &'static str, i32) {
    let tag = match e {
        SupervisorError::BackendNotFound(_) => "backend_not_found",
        SupervisorError::NotLocal(_) => "backend_not_local",
        SupervisorError::MemoryGateDenied(_) => "memory_gate_denied",
        SupervisorError::StartTimeout(_) => "start_timeout",
        SupervisorError::StartFailed(_, _) => "start_failed",
        SupervisorError::EmptyWeightsFile(_) => "empty_weights_file",
        SupervisorError::Io(_) => "io_error",
    };
    (e.to_string(), tag, EXIT_FAILURE)
}

fn describe_pipeline(e: &PipelineError) -> (String, &'static str, i32) {
    match e {
        PipelineError::Router(RouterError::Config(c)) => describe_config(c),
        PipelineError::Supervisor(s) => describe_supervisor(s),
        PipelineError::Upstream(u) => (u.to_string(), "upstream_error", EXIT_FAILURE),
        PipelineError::ToolLoopExceeded(_) => (e.to_string(), "tool_loop_exceeded", EXIT_FAILURE),
        PipelineError::Canceled => (e.to_string(), "canceled", EXIT_FAILURE),
    }
}
