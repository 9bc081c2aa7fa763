//! Translates the pipeline's [`ProtocolEvent`]s into OpenAI-compatible
//! [`ChatCompletionChunk`]s, matching how an upstream `llama-server` frames its own
//! `/v1/chat/completions` stream (spec §6 "fleet-serve ... consumes and re-exposes").
//!
//! Bookkeeping events with no OpenAI wire equivalent (`ToolCallComplete`, `ToolResult`,
//! `RoundComplete`) are not forwarded as chunks - the tool round-trip is internal to the
//! pipeline; a client only sees token/tool-call deltas and the final message, same as talking
//! to `llama-server` directly with tool use enabled.

use fleet::openai_sse::{
    ChatCompletionChunk, ChunkChoice, Delta, DeltaToolCall, DeltaToolCallFunction,
};
use stream_event::ProtocolEvent;

fn empty_chunk(id: &str, model: &str, delta: Delta, finish_reason: Option<String>) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: 0,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage: None,
    }
}

/// Returns the chunk (if any) this event translates to, or `None` for a bookkeeping event
/// this wire format has no slot for.
pub fn to_chunk(id: &str, model: &str, event: &ProtocolEvent) -> Option<ChatCompletionChunk> {
    match event {
        ProtocolEvent::RunStart { .. } => Some(empty_chunk(
            id,
            model,
            Delta {
                role: Some("assistant".to_string()),
                content: None,
                tool_calls: None,
            },
            None,
        )),
        ProtocolEvent::TokenDelta { content } => Some(empty_chunk(
            id,
            model,
            Delta {
                role: None,
                content: Some(content.clone()),
                tool_calls: None,
            },
            None,
        )),
        ProtocolEvent::ToolCallDelta {
            id: call_id,
            name,
            arguments_fragment,
        } => Some(empty_chunk(
            id,
            model,
            Delta {
                role: None,
                content: None,
                tool_calls: Some(vec![DeltaToolCall {
                    index: 0,
                    id: Some(call_id.clone()),
                    kind: Some("function".to_string()),
                    function: Some(DeltaToolCallFunction {
                        name: name.clone(),
                        arguments: Some(arguments_fragment.clone()),
                    }),
                }]),
            },
            None,
        )),
        ProtocolEvent::RunEnd { .. } => Some(empty_chunk(
            id,
            model,
            Delta::default(),
            Some("stop".to_string()),
        )),
        ProtocolEvent::Canceled => Some(empty_chunk(
            id,
            model,
            Delta::default(),
            Some("stop".to_string()),
        )),
        ProtocolEvent::Error { message, .. } => Some(empty_chunk(
            id,
            model,
            Delta {
                role: None,
                content: Some(format!("error: {message}")),
                tool_calls: None,
            },
            Some("stop".to_string()),
        )),
        ProtocolEvent::ToolCallComplete { .. }
        | ProtocolEvent::ToolResult { .. }
        | ProtocolEvent::RoundComplete { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_start_carries_role_with_no_content() {
        let event = ProtocolEvent::RunStart {
            backend: "default".to_string(),
            model: "default".to_string(),
        };
        let chunk = to_chunk("id1", "default", &event).unwrap();
        let delta = &chunk.choices[0].delta;
        assert_eq!(delta.role.as_deref(), Some("assistant"));
        assert!(delta.content.is_none());
    }

    #[test]
    fn token_delta_carries_content_with_no_role() {
        let event = ProtocolEvent::TokenDelta { content: "hi".to_string() };
        let chunk = to_chunk("id1", "default", &event).unwrap();
        let delta = &chunk.choices[0].delta;
        assert_eq!(delta.content.as_deref(), Some("hi"));
        assert!(delta.role.is_none());
    }

    #[test]
    fn run_end_sets_stop_finish_reason() {
        let event = ProtocolEvent::RunEnd { reply: "done".to_string() };
        let chunk = to_chunk("id1", "default", &event).unwrap();
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn bookkeeping_events_have_no_wire_chunk() {
        let complete = ProtocolEvent::ToolCallComplete {
            id: "call_1".to_string(),
            name: "echo_tool".to_string(),
            arguments: serde_json::Value::Null,
        };
        assert!(to_chunk("id1", "default", &complete).is_none());

        let result = ProtocolEvent::ToolResult {
            id: "call_1".to_string(),
            name: "echo_tool".to_string(),
            success: true,
            data: None,
            error: None,
            timed_out: false,
        };
        assert!(to_chunk("id1", "default", &result).is_none());

        let round = ProtocolEvent::RoundComplete { round: 1, reentering: false };
        assert!(to_chunk("id1", "default", &round).is_none());
    }
}
