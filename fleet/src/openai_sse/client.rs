//! HTTP client for talking to an OpenAI-compatible upstream backend (`llama-server` or a
//! remote endpoint resolved by [`crate::router`]).
//!
//! Streaming responses are read as `text/event-stream`: lines of `data: <json>\n\n`
//! terminated by a literal `data: [DONE]\n\n` frame. Parsed chunks are forwarded through an
//! mpsc sender as they arrive.

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;

use super::chunk::{ChatCompletionChunk, ChatCompletionResponse};
use super::request::ChatCompletionRequest;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream sent malformed stream frame: {0}")]
    MalformedFrame(String),
}

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Sends one streaming chat-completion request and forwards parsed chunks through `on_chunk`
/// as they arrive. Returns once the upstream sends `[DONE]` or closes the connection.
pub async fn stream_chat_completion(
    http: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
    request: &ChatCompletionRequest,
    on_chunk: mpsc::Sender<ChatCompletionChunk>,
) -> Result<(), UpstreamError> {
    let mut req = request.clone();
    req.stream = true;

    let url = format!("{}{}", base_url.trim_end_matches('/'), CHAT_COMPLETIONS_PATH);
    let mut builder = http.post(url).json(&req);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }
    let response = builder.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status { status, body });
    }

    let mut stream = response.bytes_stream();
    let mut buf = String::new();
    while let Some(bytes) = stream.next().await {
        let bytes = bytes?;
        buf.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(pos) = buf.find("\n\n") {
            let frame = buf[..pos].to_string();
            buf.drain(..pos + 2);
            if let Some(done) = parse_sse_frame(&frame)? {
                if on_chunk.send(done).await.is_err() {
                    return Ok(());
                }
            } else {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Parses one `data: ...` SSE frame. Returns `Ok(None)` for the terminal `[DONE]` frame and
/// `Ok(Some(_))` for other event lines; blank/comment frames are skipped by returning a
/// no-op chunk-free path via an empty choices vec upstream callers simply forward.
fn parse_sse_frame(frame: &str) -> Result<Option<ChatCompletionChunk>, UpstreamError> {
    for line in frame.lines() {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Ok(None);
        }
        if data.is_empty() {
            continue;
        }
        let chunk: ChatCompletionChunk = serde_json::from_str(data)
            .map_err(|e| UpstreamError::MalformedFrame(e.to_string()))?;
        return Ok(Some(chunk));
    }
    Ok(Some(ChatCompletionChunk {
        id: String::new(),
        object: "chat.completion.chunk".to_string(),
        created: 0,
        model: String::new(),
        choices: Vec::new(),
        usage: None,
    }))
}

/// Sends one non-streaming chat-completion request and returns the full response.
pub async fn request_chat_completion(
    http: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
    request: &ChatCompletionRequest,
) -> Result<ChatCompletionResponse, UpstreamError> {
    let mut req = request.clone();
    req.stream = false;

    let url = format!("{}{}", base_url.trim_end_matches('/'), CHAT_COMPLETIONS_PATH);
    let mut builder = http.post(url).json(&req);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }
    let response = builder.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status { status, body });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sse_frame_recognizes_done_sentinel() {
        let result = parse_sse_frame("data: [DONE]").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parse_sse_frame_parses_json_chunk() {
        let frame = r#"data: {"id":"c1","object":"chat.completion.chunk","created":1,"model":"local","choices":[{"index":0,"delta":{"content":"hi"},"finish_reason":null}]}"#;
        let chunk = parse_sse_frame(frame).unwrap().unwrap();
        assert_eq!(chunk.id, "c1");
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));
    }

    #[test]
    fn parse_sse_frame_rejects_malformed_json() {
        let err = parse_sse_frame("data: {not json}").unwrap_err();
        assert!(matches!(err, UpstreamError::MalformedFrame(_)));
    }
}
