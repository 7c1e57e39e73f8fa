//! Server-sent event decoding for streamed chat completions
//!
//! SSE format:
//! ```text
//! data: {"json": "content"}
//!
//! data: more content
//!
//! data: [DONE]
//! ```
//!
//! Events are framed incrementally as body chunks arrive, so a line split
//! across two network reads is still decoded once, in order.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use futures::future;

use super::{ByteStream, ChatError, CompletionChunk};

/// Data payload that ends a completion stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// A parsed SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data == DONE_SENTINEL
    }
}

/// Incremental SSE line parser
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning every event completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..pos]);
            if let Some(event) = self.feed_line(text.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line
    pub fn finish(mut self) -> Option<SseEvent> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let text = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.feed_line(text.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        // blank line ends the event
        if line.is_empty() {
            return self.dispatch();
        }

        // comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

struct DecodeState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
}

/// Decode a byte stream into SSE events
///
/// A body error is yielded once and ends the stream; the body is dropped
/// with it.
pub fn decode_events<S, E>(body: S) -> impl Stream<Item = Result<SseEvent, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let initial = DecodeState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
    };

    stream::unfold(Some(initial), |state| async move {
        let Some(mut state) = state else {
            return None;
        };

        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), Some(state)));
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.feed(&bytes);
                    state.ready.extend(events);
                }
                Some(Err(e)) => return Some((Err(e), None)),
                None => return state.decoder.finish().map(|event| (Ok(event), None)),
            }
        }
    })
}

/// Decode SSE events into completion chunks, stopping at `[DONE]`
///
/// A malformed payload yields `ChatError::Decode` for that event only; the
/// stream carries on with the next event.
pub fn completion_chunks<S>(events: S) -> impl Stream<Item = Result<CompletionChunk, ChatError>>
where
    S: Stream<Item = Result<SseEvent, ChatError>>,
{
    events
        .take_while(|event| future::ready(!matches!(event, Ok(event) if event.is_done())))
        .map(|event| {
            event.and_then(|event| {
                serde_json::from_str::<CompletionChunk>(&event.data).map_err(ChatError::from)
            })
        })
}

/// Completion chunks straight from a chat response body
pub fn chunk_stream(
    body: ByteStream,
) -> impl Stream<Item = Result<CompletionChunk, ChatError>> + Send {
    completion_chunks(decode_events(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{byte_stream, chunk_data, sse_body};

    fn data(data: &str) -> SseEvent {
        SseEvent {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_feed_basic() {
        let raw = "data: {\"text\":\"Hello\"}\n\ndata: {\"text\":\" world\"}\n\ndata: [DONE]\n\n";

        let mut decoder = SseDecoder::new();
        let events = decoder.feed(raw.as_bytes());

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], data(r#"{"text":"Hello"}"#));
        assert_eq!(events[1], data(r#"{"text":" world"}"#));
        assert!(events[2].is_done());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_feed_split_across_reads() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: {\"a\"").is_empty());
        assert!(decoder.feed(b":1}\n").is_empty());
        let events = decoder.feed(b"\ndata: x");

        assert_eq!(events, vec![data(r#"{"a":1}"#)]);
        assert_eq!(decoder.finish(), Some(data("x")));
    }

    #[test]
    fn test_feed_multibyte_split_across_reads() {
        let bytes = "data: héllo\n\n".as_bytes();
        let (head, tail) = bytes.split_at(8);

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail), vec![data("héllo")]);
    }

    #[test]
    fn test_feed_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(events, vec![data("one"), data("two")]);
    }

    #[test]
    fn test_feed_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(events, vec![data("first\nsecond")]);
    }

    #[test]
    fn test_feed_comments_and_event_field() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b": keepalive\n\nevent: message\nid: 7\ndata:no-space\n\nevent: ping\n\n",
        );

        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("message".to_string()),
                data: "no-space".to_string(),
            }]
        );
    }

    #[test]
    fn test_finish_without_trailing_newline() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"text\":\"test\"}").is_empty());
        assert_eq!(decoder.finish(), Some(data(r#"{"text":"test"}"#)));
    }

    #[tokio::test]
    async fn test_decode_events_from_byte_stream() {
        let body = byte_stream(vec![Ok("data: a\n\nda"), Ok("ta: b\n\n"), Ok("data: c")]);

        let events: Vec<SseEvent> = decode_events(body)
            .map(|event| event.unwrap())
            .collect()
            .await;

        assert_eq!(events, vec![data("a"), data("b"), data("c")]);
    }

    #[tokio::test]
    async fn test_decode_events_stops_after_body_error() {
        let body = byte_stream(vec![
            Ok("data: a\n\n"),
            Err("connection reset"),
            Ok("data: never\n\n"),
        ]);

        let items: Vec<_> = decode_events(body).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &data("a"));
        assert!(matches!(items[1], Err(ChatError::Transport(_))));
    }

    #[tokio::test]
    async fn test_chunk_stream_stops_at_done() {
        let body = sse_body(&[&chunk_data("Hello"), "[DONE]", &chunk_data("ignored")]);

        let contents: Vec<String> = chunk_stream(byte_stream(vec![Ok(body.as_str())]))
            .map(|chunk| chunk.unwrap().content().to_string())
            .collect()
            .await;

        assert_eq!(contents, vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_chunk_stream_reports_malformed_event_and_continues() {
        let body = sse_body(&[&chunk_data("A"), "{not json", &chunk_data("B")]);

        let items: Vec<_> = chunk_stream(byte_stream(vec![Ok(body.as_str())]))
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().content(), "A");
        assert!(matches!(items[1], Err(ChatError::Decode(_))));
        assert_eq!(items[2].as_ref().unwrap().content(), "B");
    }
}
