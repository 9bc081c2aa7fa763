//! Per-call context passed into tool execution (spec §4.3).

use crate::message::Message;

/// Context available to a tool during [`Tool::call`](crate::tools::Tool::call).
#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    /// Recent messages in the current conversation.
    pub recent_messages: Vec<Message>,
    /// Session id, when the request carried one.
    pub session_id: Option<String>,
}

impl ToolCallContext {
    pub fn new(recent_messages: Vec<Message>) -> Self {
        Self {
            recent_messages,
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }
}
