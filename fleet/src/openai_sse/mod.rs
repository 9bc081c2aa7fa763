//! OpenAI-compatible Chat Completions wire types and the HTTP client used to reach an
//! upstream backend (`llama-server` or a remote endpoint).
//!
//! # Types
//!
//! - [`ChatCompletionRequest`] / [`ChatMessage`]: request body DTOs, used both to parse
//!   `/v1/chat/completions` bodies in `fleet-serve` and to build upstream requests.
//! - [`ChatCompletionChunk`]: streamed response chunk DTO, parsed from upstream and
//!   re-serialized for `fleet-serve`'s own clients via [`write_sse_line`].
//! - [`ChatCompletionResponse`]: non-streaming response DTO.
//! - [`stream_chat_completion`] / [`request_chat_completion`]: the upstream HTTP client.

mod chunk;
mod client;
mod request;

pub use chunk::{
    write_sse_line, ChatCompletionChunk, ChatCompletionResponse, ChunkChoice, ChunkUsage, Delta,
    DeltaToolCall, DeltaToolCallFunction, ResponseChoice,
};
pub use client::{request_chat_completion, stream_chat_completion, UpstreamError};
pub use request::{
    ChatCompletionRequest, ChatMessage, ContentPart, MessageContent, StreamOptions, ToolCallDto,
    ToolCallFunctionDto, ToolDefinition, ToolFunctionDefinition,
};
