//! Maps a [`fleet::FleetError`] (or a request-shape problem this crate detects itself) to an
//! HTTP status and an OpenAI-style `{"error": {...}}` body, the same one-for-one taxonomy
//! `fleet-cli`'s `exit::describe` walks, just carrying a status code instead of an exit code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use config::ConfigError;
use fleet::{
    DispatchError, FleetError, MemoryGateError, PipelineError, RegistryError, RouterError,
    SupervisorError,
};
use serde::Serialize;

pub enum ApiError {
    Fleet(FleetError),
    BadRequest(String),
}

impl From<FleetError> for ApiError {
    fn from(e: FleetError) -> Self {
        ApiError::Fleet(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    message: String,
    #[serde(rename = "type")]
    tag: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, tag) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, "invalid_request"),
            ApiError::Fleet(e) => describe(&e),
        };
        (status, Json(ErrorBody { error: ErrorDetail { message, tag } })).into_response()
    }
}

fn describe(err: &FleetError) -> (StatusCode, String, &'static str) {
    match err {
        FleetError::Config(e) => describe_config(e),
        FleetError::Registry(e) => describe_registry(e),
        FleetError::Dispatch(e) => describe_dispatch(e),
        FleetError::Supervisor(e) => describe_supervisor(e),
        FleetError::Health(e) => (StatusCode::BAD_GATEWAY, e.to_string(), "health_unreachable"),
        FleetError::MemoryGate(e) => describe_memory_gate(e),
        FleetError::Router(RouterError::Config(e)) => describe_config(e),
        FleetError::Chat(e) => describe_pipeline(e),
    }
}

fn describe_config(e: &ConfigError) -> (StatusCode, String, &'static str) {
    let tag = match e {
        ConfigError::BackendNotFound(_) => "backend_not_found",
        _ => "config_invalid",
    };
    let status = if tag == "backend_not_found" {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, e.to_string(), tag)
}

fn describe_registry(e: &RegistryError) -> (StatusCode, String, &'static str) {
    match e {
        RegistryError::ToolNotFound(_) => (StatusCode::NOT_FOUND, e.to_string(), "tool_not_found"),
        RegistryError::AlreadyExists(_) => {
            (StatusCode::CONFLICT, e.to_string(), "tool_already_exists")
        }
        _ => (StatusCode::BAD_REQUEST, e.to_string(), "tool_registry_invalid"),
    }
}

fn describe_dispatch(e: &DispatchError) -> (StatusCode, String, &'static str) {
    match e {
        DispatchError::ToolNotFound(_) => (StatusCode::NOT_FOUND, e.to_string(), "tool_not_found"),
        DispatchError::ArgsInvalid(_) => (StatusCode::BAD_REQUEST, e.to_string(), "args_invalid"),
        DispatchError::ApprovalRequired(_) => {
            (StatusCode::FORBIDDEN, e.to_string(), "approval_required")
        }
    }
}

fn describe_supervisor(e: &SupervisorError) -> (StatusCode, String, &'static str) {
    let tag = match e {
        SupervisorError::BackendNotFound(_) => "backend_not_found",
        SupervisorError::NotLocal(_) => "backend_not_local",
        SupervisorError::MemoryGateDenied(_) => "memory_gate_denied",
        SupervisorError::StartTimeout(_) => "start_timeout",
        SupervisorError::StartFailed(_, _) => "start_failed",
        SupervisorError::EmptyWeightsFile(_) => "empty_weights_file",
        SupervisorError::Io(_) => "io_error",
    };
    let status = match e {
        SupervisorError::BackendNotFound(_) => StatusCode::NOT_FOUND,
        SupervisorError::NotLocal(_) | SupervisorError::EmptyWeightsFile(_) => {
            StatusCode::BAD_REQUEST
        }
        SupervisorError::MemoryGateDenied(_) => StatusCode::SERVICE_UNAVAILABLE,
        SupervisorError::StartTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        SupervisorError::StartFailed(_, _) | SupervisorError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string(), tag)
}

fn describe_memory_gate(e: &MemoryGateError) -> (StatusCode, String, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string(), "memory_gate_denied")
}

fn describe_pipeline(e: &PipelineError) -> (StatusCode, String, &'static str) {
    match e {
        PipelineError::Router(RouterError::Config(c)) => describe_config(c),
        PipelineError::Supervisor(s) => describe_supervisor(s),
        PipelineError::Upstream(u) => (StatusCode::BAD_GATEWAY, u.to_string(), "upstream_error"),
        PipelineError::ToolLoopExceeded(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
            "tool_loop_exceeded",
        ),
        PipelineError::Canceled => (StatusCode::REQUEST_TIMEOUT, e.to_string(), "canceled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_backend_not_found_maps_to_404() {
        let (status, _, tag) = describe_config(&ConfigError::BackendNotFound("x".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(tag, "backend_not_found");
    }

    #[test]
    fn config_other_errors_map_to_400() {
        let (status, _, tag) = describe_config(&ConfigError::Invalid("bad".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(tag, "config_invalid");
    }

    #[test]
    fn dispatch_approval_required_maps_to_403() {
        let (status, _, tag) =
            describe_dispatch(&DispatchError::ApprovalRequired("shell_exec".to_string()));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(tag, "approval_required");
    }

    #[test]
    fn bad_request_variant_uses_invalid_request_tag() {
        let response = ApiError::BadRequest("bad role".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
