//! Protocol-level event types for the streaming chat pipeline (C8).
//! State-carrying variants use `serde_json::Value`; envelope (session_id, turn_id, event_id)
//! is applied separately by [`crate::envelope`].

use serde::Serialize;
use serde_json::Value;

/// One event in a chat-completion stream, before envelope fields are injected.
///
/// Mirrors the pipeline's frame kinds (spec §4.8 step 5): token delta, tool-call delta,
/// tool-call completion, tool result, end-of-message, error.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// A run (one chat request) has started.
    RunStart { backend: String, model: String },
    /// Incremental assistant-content token(s).
    TokenDelta { content: String },
    /// Partial tool-call arguments accumulating for `id`.
    ToolCallDelta {
        id: String,
        name: Option<String>,
        arguments_fragment: String,
    },
    /// A tool call has fully accumulated and is about to be dispatched.
    ToolCallComplete {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Result of executing a tool call.
    ToolResult {
        id: String,
        name: String,
        success: bool,
        data: Option<Value>,
        error: Option<String>,
        timed_out: bool,
    },
    /// One tool-dispatch round has completed; pipeline is about to re-enter the model
    /// (or stop, for `DualPassWriteOnly` with no mutating tool in the round).
    RoundComplete { round: u32, reentering: bool },
    /// The run finished normally.
    RunEnd { reply: String },
    /// The run was canceled by the caller.
    Canceled,
    /// A terminal error for this run.
    Error { tag: String, message: String },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
