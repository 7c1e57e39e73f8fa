//! Incremental HTML rendering of a streamed chat answer
//!
//! The relay writes a fixed page prelude, then every non-empty content delta
//! HTML-escaped and flushed as soon as it arrives, then the closing markup.
//! The prelude is delayed until there is something to show, or until the
//! stream ends empty.
//!
//! Text is escaped for `& < > " '`, the same set Go's `html.EscapeString`
//! covers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ChatError, CompletionChunk};

const PRELUDE_HEAD: &str = r#"<!DOCTYPE html>
<meta charset="utf-8">
<meta name="color-scheme" content="dark" />
<style>
body { font-family: sans-serif; }
#chat .user, #chat .assistant { padding: 1rem; }
#chat .assistant { white-space: pre; }
</style>
<div id="chat">
<div class="user">"#;

const PRELUDE_TAIL: &str = "</div>\n<div class=\"assistant\">";

/// Markup written once the answer is complete
pub const CLOSING: &str = "</div>\n";

/// Page header up to the start of the assistant's answer
pub fn render_prelude(query: &str) -> String {
    format!(
        "{PRELUDE_HEAD}{}{PRELUDE_TAIL}",
        html_escape::encode_quoted_attribute(query)
    )
}

/// The downstream client went away
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Client disconnected")]
    Disconnected,
}

/// Where rendered HTML goes
///
/// `flush` must make everything written so far visible to the client.
#[async_trait]
pub trait HtmlSink: Send {
    async fn write(&mut self, fragment: &str) -> Result<(), RelayError>;

    async fn flush(&mut self) -> Result<(), RelayError>;

    /// End of output; flushes anything still buffered
    async fn close(&mut self) -> Result<(), RelayError>;

    /// Resolves once the client has gone away
    async fn closed(&self);
}

/// Sink feeding an HTTP response body through a bounded channel
///
/// Each flush sends one body frame. The channel holds a single frame, so
/// the relay never runs more than one fragment ahead of the client.
#[derive(Debug)]
pub struct ChannelSink {
    buffer: String,
    tx: mpsc::Sender<std::io::Result<Bytes>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<std::io::Result<Bytes>>) -> Self {
        Self {
            buffer: String::new(),
            tx,
        }
    }

    /// A sink and the body stream it feeds
    pub fn channel() -> (Self, ReceiverStream<std::io::Result<Bytes>>) {
        let (tx, rx) = mpsc::channel(1);
        (Self::new(tx), ReceiverStream::new(rx))
    }
}

#[async_trait]
impl HtmlSink for ChannelSink {
    async fn write(&mut self, fragment: &str) -> Result<(), RelayError> {
        self.buffer.push_str(fragment);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let frame = Bytes::from(std::mem::take(&mut self.buffer));
        self.tx
            .send(Ok(frame))
            .await
            .map_err(|_| RelayError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        self.flush().await
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Where a relay ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Reading upstream events
    Streaming,
    /// Sentinel or end of stream reached; closing markup written
    Done,
    /// Upstream broke off mid-answer; output stopped where it was
    Errored,
}

/// Summary of one relayed answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub state: RelayState,
    /// Non-empty deltas written
    pub fragments: usize,
    /// Malformed events skipped
    pub skipped: usize,
}

/// Renders one chat answer into a sink
pub struct StreamRelay<'a, W: HtmlSink + ?Sized> {
    query: &'a str,
    sink: &'a mut W,
    prelude_written: bool,
    report: RelayReport,
}

impl<'a, W: HtmlSink + ?Sized> StreamRelay<'a, W> {
    /// `query` is shown verbatim (escaped) as the user's message
    pub fn new(query: &'a str, sink: &'a mut W) -> Self {
        Self {
            query,
            sink,
            prelude_written: false,
            report: RelayReport {
                state: RelayState::Streaming,
                fragments: 0,
                skipped: 0,
            },
        }
    }

    /// Consume `chunks` until the answer ends
    ///
    /// Malformed chunks are skipped. A transport error ends the relay in
    /// [`RelayState::Errored`] without closing markup, since the response
    /// status is already committed. Only a sink failure or a client that
    /// went away while upstream was quiet is returned as an error; the
    /// upstream stream is dropped on every exit.
    pub async fn run<S>(mut self, chunks: S) -> Result<RelayReport, RelayError>
    where
        S: Stream<Item = Result<CompletionChunk, ChatError>>,
    {
        futures::pin_mut!(chunks);

        loop {
            let item = tokio::select! {
                item = chunks.next() => item,
                _ = self.sink.closed() => return Err(RelayError::Disconnected),
            };
            let Some(item) = item else {
                break;
            };

            match item {
                Ok(chunk) => self.emit(chunk.content()).await?,
                Err(ChatError::Decode(e)) => {
                    tracing::warn!("Skipping malformed completion chunk: {e}");
                    self.report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Chat stream failed after {} fragments ({}): {e}",
                        self.report.fragments,
                        e.category()
                    );
                    self.report.state = RelayState::Errored;
                    return Ok(self.report);
                }
            }
        }

        self.write_prelude_if_needed().await?;
        self.sink.write(CLOSING).await?;
        self.sink.close().await?;

        self.report.state = RelayState::Done;
        Ok(self.report)
    }

    async fn emit(&mut self, content: &str) -> Result<(), RelayError> {
        if content.is_empty() {
            return Ok(());
        }

        self.write_prelude_if_needed().await?;
        self.sink
            .write(&html_escape::encode_quoted_attribute(content))
            .await?;
        self.sink.flush().await?;
        self.report.fragments += 1;
        Ok(())
    }

    async fn write_prelude_if_needed(&mut self) -> Result<(), RelayError> {
        if self.prelude_written {
            return Ok(());
        }
        self.sink.write(&render_prelude(self.query)).await?;
        self.prelude_written = true;
        Ok(())
    }
}

/// Pull chunks until the first one with text
///
/// Runs before the response status is chosen: empty and malformed chunks
/// are skipped, a transport error is returned so it can still become a 500,
/// and `None` means the answer ended without any text.
pub async fn first_content<S>(chunks: &mut S) -> Result<Option<CompletionChunk>, ChatError>
where
    S: Stream<Item = Result<CompletionChunk, ChatError>> + Unpin,
{
    while let Some(item) = chunks.next().await {
        match item {
            Ok(chunk) if chunk.content().is_empty() => {}
            Ok(chunk) => return Ok(Some(chunk)),
            Err(ChatError::Decode(e)) => {
                tracing::warn!("Skipping malformed completion chunk: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
