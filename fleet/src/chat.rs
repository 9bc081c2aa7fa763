//! Streaming Chat Pipeline (spec §4.8 / C8): resolves the active endpoint, starts the
//! backend if needed, streams tokens back to the caller, and interleaves LLM-invokable
//! tool calls - detected either natively or via the XML adapter (C9) - executed through
//! the dispatcher (C3) and fed back into the model.
//!
//! Frames are published as [`stream_event::ProtocolEvent`] on an mpsc channel so both
//! `fleet-serve` (SSE) and `fleet-cli` (stdout) consume the same shape.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use config::{Config, ToolExecutionMode};
use stream_event::ProtocolEvent;

use crate::dispatcher::ToolDispatcher;
use crate::memory_gate;
use crate::message::{Message, ToolCall};
use crate::openai_sse::{
    stream_chat_completion, ChatCompletionRequest, ChatMessage, StreamOptions, ToolDefinition,
    ToolFunctionDefinition, UpstreamError,
};
use crate::registry::ToolRegistry;
use crate::router::{self, BackendSource, RouterError};
use crate::supervisor::{Supervisor, SupervisorError};
use crate::xml_adapter;

/// Hard safety ceiling on tool-dispatch rounds per request (spec §4.8 step 6e).
pub const MAX_TOOL_ROUNDS: u32 = 8;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("tool dispatch loop exceeded {0} rounds")]
    ToolLoopExceeded(u32),
    #[error("canceled")]
    Canceled,
}

/// Drives one multi-turn chat request (spec §4.8). Stateless across calls; holds only the
/// HTTP client used to reach the upstream backend.
#[derive(Clone)]
pub struct ChatPipeline {
    http: reqwest::Client,
}

impl ChatPipeline {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Runs the pipeline to completion, emitting [`ProtocolEvent`]s on `events` as they
    /// occur and returning the final assistant reply text.
    ///
    /// `force_start` bypasses the memory gate (spec §4.6 step 4); `tool_mode_override`
    /// overrides the configured [`ToolExecutionMode`] for this request only.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        config: &Config,
        supervisor: &Arc<Supervisor>,
        registry: &ToolRegistry,
        dispatcher: &ToolDispatcher,
        system: &sysinfo::System,
        mut messages: Vec<Message>,
        force_start: bool,
        tool_mode_override: Option<ToolExecutionMode>,
        cancel: &CancellationToken,
        events: mpsc::Sender<ProtocolEvent>,
    ) -> Result<String, PipelineError> {
        let resolved = router::resolve(config)?;

        if resolved.kind == BackendSource::Local {
            let backend_name = resolved
                .backend_name
                .as_deref()
                .expect("router always sets backend_name for Local");
            if !supervisor.is_running(backend_name).await {
                let backend = config
                    .get_backend(backend_name)
                    .cloned()
                    .ok_or_else(|| RouterError::from(config::ConfigError::BackendNotFound(backend_name.to_string())))?;
                let running_weights = running_local_weights_bytes(config, supervisor).await;
                supervisor
                    .start(&backend, force_start, system, &running_weights)
                    .await?;
            }
        }

        let _ = events
            .send(ProtocolEvent::RunStart {
                backend: resolved
                    .backend_name
                    .clone()
                    .unwrap_or_else(|| "remote".to_string()),
                model: resolved.model_identifier.clone(),
            })
            .await;

        let tool_defs: Vec<ToolDefinition> = registry
            .list_enabled_invokable()
            .iter()
            .map(tool_to_definition)
            .collect();
        let mode = tool_mode_override.unwrap_or_else(|| config.tool_execution_mode());

        let mut round: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                let _ = events.send(ProtocolEvent::Canceled).await;
                return Err(PipelineError::Canceled);
            }

            let (content, tool_calls) = self
                .send_one_turn(&resolved, &messages, &tool_defs, cancel, &events)
                .await?;

            let mut calls = tool_calls;
            if calls.is_empty() && xml_adapter::contains_xml_function_call(&content) {
                calls = xml_adapter::parse_xml_tool_calls(&content);
            }

            if calls.is_empty() {
                let _ = events
                    .send(ProtocolEvent::RunEnd {
                        reply: content.clone(),
                    })
                    .await;
                return Ok(content);
            }

            round += 1;
            if round > MAX_TOOL_ROUNDS {
                return Err(PipelineError::ToolLoopExceeded(MAX_TOOL_ROUNDS));
            }

            messages.push(Message::Assistant {
                content: content.clone(),
                tool_calls: calls.clone(),
            });

            let mut any_mutating = false;
            for call in &calls {
                let _ = events
                    .send(ProtocolEvent::ToolCallComplete {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await;

                if is_mutating_call(&call.name, &call.arguments) {
                    any_mutating = true;
                }

                let invoke_fut = dispatcher.invoke(registry, &call.name, call.arguments.clone(), false, None);
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let _ = events.send(ProtocolEvent::Canceled).await;
                        return Err(PipelineError::Canceled);
                    }
                    result = invoke_fut => result,
                };

                let _ = events
                    .send(ProtocolEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        success: result.success,
                        data: result.data.clone(),
                        error: result.error.clone(),
                        timed_out: result.timed_out,
                    })
                    .await;

                let tool_content = serde_json::to_string(&result).unwrap_or_else(|_| {
                    r#"{"success":false,"error":"result serialization failed"}"#.to_string()
                });
                messages.push(Message::Tool {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: tool_content,
                });
            }

            let reenter = match mode {
                ToolExecutionMode::SinglePass | ToolExecutionMode::DualPassAll => true,
                ToolExecutionMode::DualPassWriteOnly => any_mutating,
            };
            let _ = events
                .send(ProtocolEvent::RoundComplete {
                    round,
                    reentering: reenter,
                })
                .await;

            if !reenter {
                let summary = summarize_tool_calls(&calls);
                let _ = events
                    .send(ProtocolEvent::RunEnd {
                        reply: summary.clone(),
                    })
                    .await;
                return Ok(summary);
            }
        }
    }

    /// Sends one request to the upstream backend and streams it back, accumulating content
    /// and any tool-call deltas. Returns once the upstream emits its terminal frame.
    async fn send_one_turn(
        &self,
        resolved: &router::ResolvedEndpoint,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
        cancel: &CancellationToken,
        events: &mpsc::Sender<ProtocolEvent>,
    ) -> Result<(String, Vec<ToolCall>), PipelineError> {
        let request = build_request(messages, tool_defs, &resolved.model_identifier);
        let (chunk_tx, mut chunk_rx) = mpsc::channel(64);
        let http = self.http.clone();
        let base_url = resolved.base_url.clone();
        let api_key = resolved.api_key.clone();
        let req = request.clone();
        let upstream = tokio::spawn(async move {
            stream_chat_completion(&http, &base_url, Some(&api_key), &req, chunk_tx).await
        });

        let mut content = String::new();
        let mut partial_calls: BTreeMap<u32, PartialToolCall> = BTreeMap::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    upstream.abort();
                    let _ = events.send(ProtocolEvent::Canceled).await;
                    return Err(PipelineError::Canceled);
                }
                chunk = chunk_rx.recv() => {
                    let Some(chunk) = chunk else { break };
                    for choice in chunk.choices {
                        if let Some(text) = choice.delta.content {
                            if !text.is_empty() {
                                content.push_str(&text);
                                let _ = events.send(ProtocolEvent::TokenDelta { content: text }).await;
                            }
                        }
                        if let Some(deltas) = choice.delta.tool_calls {
                            for delta in deltas {
                                let entry = partial_calls.entry(delta.index).or_default();
                                if let Some(id) = delta.id {
                                    entry.id = Some(id);
                                }
                                if let Some(function) = delta.function {
                                    if let Some(name) = function.name {
                                        entry.name = Some(name);
                                    }
                                    if let Some(fragment) = function.arguments {
                                        let _ = events.send(ProtocolEvent::ToolCallDelta {
                                            id: entry.id.clone().unwrap_or_default(),
                                            name: entry.name.clone(),
                                            arguments_fragment: fragment.clone(),
                                        }).await;
                                        entry.arguments_buffer.push_str(&fragment);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        match upstream.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PipelineError::Upstream(e)),
            Err(_) => return Err(PipelineError::Canceled),
        }

        let calls = partial_calls
            .into_values()
            .enumerate()
            .map(|(i, p)| p.finish(i))
            .collect();
        Ok((content, calls))
    }

    /// Non-streaming form (spec §4.8 step 7): reduces to the same loop, but the caller only
    /// sees the final reply - intermediate events are still emitted on `events` so a caller
    /// that wants progress (e.g. for logging) may still consume them.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_buffered(
        &self,
        config: &Config,
        supervisor: &Arc<Supervisor>,
        registry: &ToolRegistry,
        dispatcher: &ToolDispatcher,
        system: &sysinfo::System,
        messages: Vec<Message>,
        force_start: bool,
        tool_mode_override: Option<ToolExecutionMode>,
    ) -> Result<String, PipelineError> {
        let (tx, mut rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        self.run(
            config,
            supervisor,
            registry,
            dispatcher,
            system,
            messages,
            force_start,
            tool_mode_override,
            &cancel,
            tx,
        )
        .await
    }
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments_buffer: String,
}

impl PartialToolCall {
    fn finish(self, index: usize) -> ToolCall {
        let arguments = if self.arguments_buffer.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.arguments_buffer).unwrap_or(Value::Object(Default::default()))
        };
        ToolCall {
            id: self.id.unwrap_or_else(|| format!("call_{index}")),
            name: self.name.unwrap_or_default(),
            arguments,
        }
    }
}

fn build_request(
    messages: &[Message],
    tool_defs: &[ToolDefinition],
    model: &str,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        messages: messages.iter().map(ChatMessage::from).collect(),
        model: model.to_string(),
        stream: true,
        stream_options: Some(StreamOptions { include_usage: false }),
        tools: (!tool_defs.is_empty()).then(|| tool_defs.to_vec()),
        tool_choice: None,
    }
}

fn tool_to_definition(tool: &crate::registry::Tool) -> ToolDefinition {
    ToolDefinition {
        kind: "function".to_string(),
        function: ToolFunctionDefinition {
            name: tool.name.clone(),
            description: (!tool.category.is_empty()).then(|| tool.category.clone()),
            parameters: tool.schema.clone(),
        },
    }
}

fn summarize_tool_calls(calls: &[ToolCall]) -> String {
    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
    format!("invoked tool(s): {}", names.join(", "))
}

/// Coarse mutation classification (spec §9 "mutating inferred from mode"): `shell_exec`
/// always mutates external state; `file_access` mutates only on `operation: "write"`;
/// everything else (e.g. `echo_tool`) is treated as read-only.
fn is_mutating_call(tool_name: &str, arguments: &Value) -> bool {
    match tool_name {
        "shell_exec" => true,
        "file_access" => arguments.get("operation").and_then(|v| v.as_str()) == Some("write"),
        _ => false,
    }
}

async fn running_local_weights_bytes(config: &Config, supervisor: &Supervisor) -> Vec<u64> {
    let running = supervisor.get_running().await;
    let mut sizes = Vec::new();
    for name in running {
        if let Some(backend) = config.get_backend(&name) {
            if let config::BackendKind::Local { weights_file, .. } = &backend.kind {
                if let Ok(meta) = std::fs::metadata(weights_file) {
                    sizes.push(meta.len());
                }
            }
        }
    }
    sizes
}

/// Silences unused-import warnings for the memory-gate estimate helper re-exported for
/// callers (e.g. `fleet-cli server status`) that want to display a projected allocation
/// without going through a full `Supervisor::start`.
pub fn estimate_backend_working_set(weights_file_bytes: u64) -> u64 {
    memory_gate::estimate_working_set(weights_file_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutating_classification_matches_spec_examples() {
        assert!(is_mutating_call("shell_exec", &serde_json::json!({"command": "ls"})));
        assert!(is_mutating_call(
            "file_access",
            &serde_json::json!({"operation": "write"})
        ));
        assert!(!is_mutating_call(
            "file_access",
            &serde_json::json!({"operation": "read"})
        ));
        assert!(!is_mutating_call("echo_tool", &serde_json::json!({"text": "hi"})));
    }

    #[test]
    fn partial_tool_call_finish_defaults_empty_arguments_to_object() {
        let call = PartialToolCall {
            id: Some("call_1".to_string()),
            name: Some("echo_tool".to_string()),
            arguments_buffer: String::new(),
        }
        .finish(0);
        assert_eq!(call.arguments, Value::Object(Default::default()));
    }

    #[test]
    fn partial_tool_call_finish_parses_accumulated_json() {
        let call = PartialToolCall {
            id: Some("call_1".to_string()),
            name: Some("echo_tool".to_string()),
            arguments_buffer: r#"{"text":"hi"}"#.to_string(),
        }
        .finish(0);
        assert_eq!(call.arguments["text"], "hi");
    }

    #[test]
    fn summarize_tool_calls_lists_names() {
        let calls = vec![
            ToolCall { id: "1".into(), name: "a".into(), arguments: Value::Null },
            ToolCall { id: "2".into(), name: "b".into(), arguments: Value::Null },
        ];
        assert_eq!(summarize_tool_calls(&calls), "invoked tool(s): a, b");
    }
}
