//! Test utilities for bangway - fixtures and fakes
//!
//! This module provides:
//! - A recording [`HtmlSink`] that counts flushes
//! - Builders for OpenAI-style SSE bodies and completion chunks

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::chat::{ByteStream, ChatError, CompletionChunk, HtmlSink, RelayError};

/// Sink that keeps everything written to it
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Every fragment written, in order
    pub output: String,
    /// Output grouped by flush
    pub frames: Vec<String>,
    /// Number of successful flushes
    pub flushes: usize,
    /// Whether `close` was called
    pub closed: bool,
    pending: String,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose flushes fail once `flushes` have succeeded, as if the
    /// client hung up
    pub fn failing_after(flushes: usize) -> Self {
        Self {
            fail_after: Some(flushes),
            ..Self::default()
        }
    }
}

#[async_trait]
impl HtmlSink for RecordingSink {
    async fn write(&mut self, fragment: &str) -> Result<(), RelayError> {
        self.output.push_str(fragment);
        self.pending.push_str(fragment);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        if let Some(limit) = self.fail_after {
            if self.flushes >= limit {
                return Err(RelayError::Disconnected);
            }
        }
        self.frames.push(std::mem::take(&mut self.pending));
        self.flushes += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        self.closed = true;
        Ok(())
    }

    // Disconnects only surface through `fail_after`.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// JSON payload of a streamed completion chunk carrying `content`
pub fn chunk_data(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "model": "test-model",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    })
    .to_string()
}

/// Decoded chunk carrying `content`
pub fn chunk(content: &str) -> CompletionChunk {
    serde_json::from_str(&chunk_data(content)).unwrap_or_default()
}

/// SSE body with one `data:` event per payload
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {payload}\n\n"))
        .collect()
}

/// A response body delivering `parts` as separate reads; `Err` parts become
/// transport errors
pub fn byte_stream(parts: Vec<Result<&str, &str>>) -> ByteStream {
    let items: Vec<Result<Bytes, ChatError>> = parts
        .into_iter()
        .map(|part| match part {
            Ok(text) => Ok(Bytes::from(text.to_string())),
            Err(reason) => Err(ChatError::Transport(reason.to_string())),
        })
        .collect();
    futures::stream::iter(items).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_round_trips_content() {
        assert_eq!(chunk("Hash").content(), "Hash");
        assert_eq!(chunk("").content(), "");
    }

    #[test]
    fn sse_body_frames_each_payload() {
        assert_eq!(sse_body(&["a", "[DONE]"]), "data: a\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn recording_sink_fails_after_limit() {
        let mut sink = RecordingSink::failing_after(1);
        sink.write("a").await.unwrap();
        assert!(sink.flush().await.is_ok());
        sink.write("b").await.unwrap();
        assert_eq!(sink.flush().await, Err(RelayError::Disconnected));
        assert_eq!(sink.frames, vec!["a".to_string()]);
        assert_eq!(sink.output, "ab");
    }
}
