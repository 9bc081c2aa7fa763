//! Envelope (session_id, turn_id, event_id) wrapped around every [`ProtocolEvent`].
//! [`EnvelopeState`] tracks the current tool-dispatch round and injects the envelope into
//! each event as it is emitted, so a client correlating an SSE/NDJSON stream can tell which
//! round (tool-dispatch loop iteration, spec §4.8 step 6e) an event belongs to.

use crate::event::ProtocolEvent;
use serde_json::Value;

/// Envelope fields attached to each streamed event.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Session ID; constant within one chat request.
    pub session_id: Option<String>,
    /// Current tool-dispatch round (0 = before any tool call in this turn).
    pub turn_id: Option<String>,
    /// Per-message sequence number; monotonically increasing within a stream.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_turn_id(mut self, id: impl Into<String>) -> Self {
        self.turn_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref id) = self.turn_id {
            obj.entry("turn_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one chat request: session id, current round, next event id.
pub struct EnvelopeState {
    pub session_id: String,
    pub round: u32,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            round: 0,
            next_event_id: 1,
        }
    }

    /// Injects envelope into the event value and advances the event id.
    /// On `type == "round_complete"`, advances the round counter for subsequent events.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_turn_id(self.round.to_string())
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
        if value.get("type").and_then(|v| v.as_str()) == Some("round_complete") {
            self.round += 1;
        }
    }
}

/// Converts a protocol event to JSON and injects envelope using the given state.
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_inject() {
        let mut obj = serde_json::json!({"type":"token_delta","content":"hi"});
        let env = Envelope::new()
            .with_session_id("sess-1")
            .with_turn_id("0")
            .with_event_id(1);
        env.inject_into(&mut obj);
        assert_eq!(obj["session_id"], "sess-1");
        assert_eq!(obj["turn_id"], "0");
        assert_eq!(obj["event_id"], 1);
    }

    #[test]
    fn to_json_advances_event_id_and_round() {
        let mut state = EnvelopeState::new("run-123".to_string());
        let v1 = to_json(&ProtocolEvent::TokenDelta { content: "a".into() }, &mut state).unwrap();
        assert_eq!(v1["event_id"], 1);
        assert_eq!(v1["turn_id"], "0");

        let v2 = to_json(&ProtocolEvent::RoundComplete { round: 0, reentering: true }, &mut state).unwrap();
        assert_eq!(v2["event_id"], 2);
        assert_eq!(v2["turn_id"], "0");

        let v3 = to_json(&ProtocolEvent::TokenDelta { content: "b".into() }, &mut state).unwrap();
        assert_eq!(v3["event_id"], 3);
        assert_eq!(v3["turn_id"], "1");
    }
}
