//! OpenAI-compatible chat completion request DTOs.
//!
//! Used both to parse incoming `/v1/chat/completions` bodies and to build the request the
//! pipeline sends upstream to a backend. Field names match the
//! [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//! Message `content` can be a string or an array of parts (multimodal); we accept both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, ToolCall};

/// Chat completion request body (OpenAI-compatible): `messages`, `stream`, `tools`,
/// `tool_choice` (spec §6 "Requests carry messages, stream, tools, tool_choice").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionRequest {
    /// List of messages (system, user, assistant, tool).
    pub messages: Vec<ChatMessage>,
    /// Model name. Echoed in responses; the actual model is server-configured.
    pub model: String,
    /// When true, response is streamed as SSE.
    #[serde(default)]
    pub stream: bool,
    /// Optional stream options (e.g. include_usage in the final chunk).
    #[serde(default)]
    pub stream_options: Option<StreamOptions>,
    /// Tools advertised to the model for this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// "auto" | "none" | "required", or an explicit forced-tool object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

/// One tool advertised to the model (OpenAI `tools[i]` function-call shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: ToolFunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

fn function_type() -> String {
    "function".to_string()
}

/// A single message in the chat request/response.
///
/// Matches OpenAI message shape: role + content, plus assistant `tool_calls` and
/// tool-result `tool_call_id` (spec §3 `Message`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `tool_calls[i]` on an assistant message (OpenAI function-call shape). `arguments` is a
/// JSON-encoded string on the wire, matching upstream/downstream OpenAI-compatible servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDto {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: ToolCallFunctionDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunctionDto {
    pub name: String,
    pub arguments: String,
}

impl ToolCallDto {
    pub fn to_domain(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            name: self.function.name.clone(),
            arguments: serde_json::from_str(&self.function.arguments)
                .unwrap_or_else(|_| Value::Object(Default::default())),
        }
    }
}

/// Message content: either a plain string or an array of parts (OpenAI multimodal).
///
/// Deserializes from `"hello"` or `[{"type":"text","text":"hello"},{"type":"image_url",...}]`
/// so clients can send either format without "invalid type: sequence, expected a string".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    String(String),
    Array(Vec<ContentPart>),
}

impl MessageContent {
    /// Returns the text of this content: the string variant as-is, or concatenation of
    /// all `text` fields from array parts. Other part types are skipped.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::String(s) => s.clone(),
            MessageContent::Array(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::String(s)
    }
}

/// One part of a multimodal message content array (OpenAI format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: Option<String>,
    pub text: Option<String>,
}

/// Stream options for chat completion (OpenAI `stream_options`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

impl ChatMessage {
    /// Converts an incoming request message into the domain [`Message`] shape the chat
    /// pipeline operates on (the inverse of `ChatMessage::from(&Message)`, used by
    /// `fleet-serve` to turn a parsed `/v1/chat/completions` body into pipeline input).
    pub fn to_message(&self) -> Result<Message, String> {
        let text = self.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
        match self.role.as_str() {
            "system" => Ok(Message::System(text)),
            "user" => Ok(Message::User(text)),
            "assistant" => Ok(Message::Assistant {
                content: text,
                tool_calls: self
                    .tool_calls
                    .as_ref()
                    .map(|calls| calls.iter().map(ToolCallDto::to_domain).collect())
                    .unwrap_or_default(),
            }),
            "tool" => Ok(Message::Tool {
                tool_call_id: self
                    .tool_call_id
                    .clone()
                    .ok_or_else(|| "tool message missing tool_call_id".to_string())?,
                name: self.name.clone().unwrap_or_default(),
                content: text,
            }),
            other => Err(format!("unsupported message role {other:?}")),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(m: &Message) -> Self {
        match m {
            Message::System(s) => ChatMessage {
                role: "system".to_string(),
                content: Some(s.clone().into()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            },
            Message::User(s) => ChatMessage {
                role: "user".to_string(),
                content: Some(s.clone().into()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            },
            Message::Assistant { content, tool_calls } => ChatMessage {
                role: "assistant".to_string(),
                content: if content.is_empty() {
                    None
                } else {
                    Some(content.clone().into())
                },
                tool_calls: (!tool_calls.is_empty()).then(|| {
                    tool_calls
                        .iter()
                        .map(|tc| ToolCallDto {
                            id: tc.id.clone(),
                            kind: function_type(),
                            function: ToolCallFunctionDto {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: None,
                name: None,
            },
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => ChatMessage {
                role: "tool".to_string(),
                content: Some(content.clone().into()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_as_text_joins_array_parts() {
        let content = MessageContent::Array(vec![
            ContentPart {
                part_type: Some("text".to_string()),
                text: Some("hello ".to_string()),
            },
            ContentPart {
                part_type: Some("image_url".to_string()),
                text: None,
            },
            ContentPart {
                part_type: Some("text".to_string()),
                text: Some("world".to_string()),
            },
        ]);
        assert_eq!(content.as_text(), "hello world");
    }

    #[test]
    fn chat_message_from_assistant_with_tool_calls_round_trips() {
        let msg = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "echo_tool".to_string(),
                arguments: serde_json::json!({"text": "hi"}),
            }],
        };
        let dto = ChatMessage::from(&msg);
        assert_eq!(dto.role, "assistant");
        assert!(dto.content.is_none());
        let calls = dto.tool_calls.expect("tool_calls present");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "echo_tool");
        let domain = calls[0].to_domain();
        assert_eq!(domain.name, "echo_tool");
        assert_eq!(domain.arguments["text"], "hi");
    }

    #[test]
    fn chat_message_from_tool_message_carries_tool_call_id() {
        let msg = Message::Tool {
            tool_call_id: "call_1".to_string(),
            name: "echo_tool".to_string(),
            content: "hi".to_string(),
        };
        let dto = ChatMessage::from(&msg);
        assert_eq!(dto.role, "tool");
        assert_eq!(dto.tool_call_id.as_deref(), Some("call_1"));
    }
}
