//! HTTP handlers for the OpenAI-compatible surface (spec §6): `/v1/chat/completions`
//! (streaming + non-streaming), `/v1/models`, `/healthz`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use fleet::openai_sse::{
    write_sse_line, ChatCompletionRequest, ChatCompletionResponse, ResponseChoice,
};
use fleet::{build_dispatcher, Message};
use stream_event::ProtocolEvent;

use crate::app::AppState;
use crate::error::ApiError;
use crate::{paths, shared, sse};

const EVENT_QUEUE_CAPACITY: usize = 256;

fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

fn parse_messages(request: &ChatCompletionRequest) -> Result<Vec<Message>, ApiError> {
    request
        .messages
        .iter()
        .map(|m| m.to_message().map_err(ApiError::BadRequest))
        .collect()
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    let messages = parse_messages(&request)?;
    let config = shared::load_config()?;
    let registry = shared::load_registry()?;
    let dispatcher = build_dispatcher(&registry, &paths::working_dir());
    let system = sysinfo::System::new_all();

    if request.stream {
        Ok(stream_response(state, request.model, config, registry, dispatcher, system, messages))
    } else {
        let reply = state
            .pipeline
            .run_buffered(
                &config,
                &state.supervisor,
                &registry,
                &dispatcher,
                &system,
                messages,
                false,
                None,
            )
            .await
            .map_err(fleet::FleetError::from)?;

        let response = ChatCompletionResponse {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created: 0,
            model: request.model,
            choices: vec![ResponseChoice {
                index: 0,
                message: fleet::openai_sse::ChatMessage::from(&Message::assistant(reply)),
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        };
        Ok(Json(response).into_response())
    }
}

/// Spawns the pipeline in the background and maps its event stream onto SSE lines. The
/// `fleet-serve` process outlives the HTTP response, so a client that disconnects mid-stream
/// just stops reading - there is no `CancellationToken` wired to the connection drop here
/// (axum's `Body::from_stream` drops the receiver, which only stops us forwarding further
/// chunks; the pipeline task runs to completion or its own `MAX_TOOL_ROUNDS`/timeout limits).
fn stream_response(
    state: Arc<AppState>,
    model: String,
    config: config::Config,
    registry: fleet::ToolRegistry,
    dispatcher: fleet::ToolDispatcher,
    system: sysinfo::System,
    messages: Vec<Message>,
) -> Response {
    let (tx, rx) = mpsc::channel::<ProtocolEvent>(EVENT_QUEUE_CAPACITY);
    let id = completion_id();
    let model_for_task = model.clone();

    let error_tx = tx.clone();
    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        let result = state
            .pipeline
            .run(
                &config,
                &state.supervisor,
                &registry,
                &dispatcher,
                &system,
                messages,
                false,
                None,
                &cancel,
                tx,
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "chat completion stream ended in error");
            let _ = error_tx
                .send(ProtocolEvent::Error {
                    tag: "pipeline_error".to_string(),
                    message: e.to_string(),
                })
                .await;
        }
    });

    let id_for_stream = id;
    let body_stream = ReceiverStream::new(rx).filter_map(move |event| {
        let line = sse::to_chunk(&id_for_stream, &model_for_task, &event)
            .map(|chunk| write_sse_line(&chunk));
        async move { line.map(|line| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(line))) }
    });
    let done = tokio_stream::once(Ok::<_, std::convert::Infallible>(axum::body::Bytes::from_static(
        b"data: [DONE]\n\n",
    )));
    let full_stream = body_stream.chain(done);

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(full_stream))
        .expect("static headers and a streaming body never fail to build")
}

pub async fn list_models(State(_state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let config = shared::load_config()?;
    let data: Vec<serde_json::Value> = config
        .backends()
        .iter()
        .map(|b| {
            json!({
                "id": b.name,
                "object": "model",
                "created": 0,
                "owned_by": "fleet",
            })
        })
        .collect();
    Ok(Json(json!({ "object": "list", "data": data })))
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
