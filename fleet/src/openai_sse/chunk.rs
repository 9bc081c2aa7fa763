//! OpenAI-compatible chat completion chunk (streaming response) DTOs.
//!
//! Each SSE line is `data: <JSON>\n\n` where JSON is a [`ChatCompletionChunk`]. Matches
//! [OpenAI streaming](https://platform.openai.com/docs/api-reference/chat-streaming). Used
//! both to deserialize chunks arriving from an upstream `llama-server` and to serialize
//! chunks `fleet-serve` re-emits to its own clients.

use serde::{Deserialize, Serialize};

/// A single streamed chunk of a chat completion (object: "chat.completion.chunk").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionChunk {
    /// Unique id for this completion; same for all chunks in the stream.
    pub id: String,
    /// Always "chat.completion.chunk".
    #[serde(default = "object_field")]
    pub object: String,
    /// Unix timestamp (seconds) when the completion was created.
    #[serde(default)]
    pub created: u64,
    /// Model name (echoed from request or server config).
    #[serde(default)]
    pub model: String,
    /// List of choices (typically one element; index 0).
    pub choices: Vec<ChunkChoice>,
    /// Usage statistics; present only in the final chunk when include_usage was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

fn object_field() -> String {
    "chat.completion.chunk".to_string()
}

impl ChatCompletionChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";
}

/// One choice in a streamed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content for a streamed chunk.
///
/// First chunk may have role + empty content; content chunks have content only; a
/// tool_calls chunk has a tool_calls array and typically finish_reason "tool_calls"; the
/// final chunk has an empty delta.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

/// One tool call in a streamed delta (OpenAI streaming tool_calls format). Arguments arrive
/// incrementally across chunks and must be concatenated by index before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeltaToolCall {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<DeltaToolCallFunction>,
}

/// Nested function payload for a streamed tool call delta.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct DeltaToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments JSON string fragment; may be partial, concatenate across chunks by index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Token usage, present in the final chunk when requested.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ChunkUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Serializes a [`ChatCompletionChunk`] to a single SSE line: `data: <JSON>\n\n`.
pub fn write_sse_line(chunk: &ChatCompletionChunk) -> String {
    let json = serde_json::to_string(chunk).expect("chunk serialization is infallible");
    format!("data: {json}\n\n")
}

/// Non-streaming chat completion response (full message, not a delta).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default = "response_object_field")]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ResponseChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

fn response_object_field() -> String {
    "chat.completion".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResponseChoice {
    pub index: u32,
    pub message: crate::openai_sse::request::ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_sse_line_wraps_json_with_data_prefix_and_blank_line() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-1".to_string(),
            object: ChatCompletionChunk::OBJECT.to_string(),
            created: 1,
            model: "local".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    role: Some("assistant".to_string()),
                    content: Some(String::new()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            usage: None,
        };
        let line = write_sse_line(&chunk);
        assert!(line.starts_with("data: "));
        assert!(line.ends_with("\n\n"));
        assert!(line.contains("chat.completion.chunk"));
    }

    #[test]
    fn chunk_deserializes_tool_call_delta_from_upstream_shape() {
        let raw = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 123,
            "model": "local",
            "choices": [{
                "index": 0,
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "echo_tool", "arguments": "{\"te"}
                    }]
                },
                "finish_reason": null
            }]
        });
        let chunk: ChatCompletionChunk = serde_json::from_value(raw).unwrap();
        let delta = &chunk.choices[0].delta;
        let tc = &delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.function.as_ref().unwrap().name.as_deref(), Some("echo_tool"));
    }
}
