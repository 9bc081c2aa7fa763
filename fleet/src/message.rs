//! Chat messages exchanged with a backend and with tools (spec §3 `Message`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool call requested by the assistant (OpenAI `tool_calls[i]` shape).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as returned by the model (already-parsed object, or `{}`).
    pub arguments: Value,
}

/// A single message in a chat conversation.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(s: impl Into<String>) -> Self {
        Message::System(s.into())
    }

    pub fn user(s: impl Into<String>) -> Self {
        Message::User(s.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System(_) => "system",
            Message::User(_) => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Message::System(s) | Message::User(s) => s,
            Message::Assistant { content, .. } => content,
            Message::Tool { content, .. } => content,
        }
    }
}
