//! Stream event protocol: type + payload + envelope.
//!
//! This crate defines the wire shape of a single chat-pipeline stream event and envelope
//! injection. It has no dependency on `fleet`; `fleet::chat` bridges its internal pipeline
//! frames into [`ProtocolEvent`] and calls [`to_json`].

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
