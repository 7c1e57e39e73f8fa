//! Streamed LLM answers for conversational queries
//!
//! [`ChatClient`] opens a streaming chat completion against an
//! OpenAI-compatible API, [`sse`] turns the response body into completion
//! chunks, and [`StreamRelay`] renders those chunks as HTML as they arrive.

mod client;
pub mod relay;
pub mod sse;

pub use client::{ChatClient, ChatCompletionRequest, Message};
pub use relay::{
    ChannelSink, HtmlSink, RelayError, RelayReport, RelayState, StreamRelay, first_content,
};
pub use sse::{DONE_SENTINEL, SseDecoder, SseEvent, chunk_stream, completion_chunks, decode_events};

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw streaming body of a chat completion response
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// Errors from the upstream chat API
#[derive(Error, Debug)]
pub enum ChatError {
    /// The request could not be sent or no response arrived
    #[error("Chat request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status
    #[error("Chat API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response body broke off mid-stream
    #[error("Chat stream interrupted: {0}")]
    Transport(String),

    /// A single event did not decode as a completion chunk
    #[error("Malformed completion chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ChatError {
    /// Category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ChatError::Request(_) => "request",
            ChatError::Upstream { .. } => "upstream",
            ChatError::Transport(_) => "transport",
            ChatError::Decode(_) => "decode",
        }
    }
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Conversation turns, alternating user and assistant, starting with the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<String>,
}

impl Conversation {
    /// A conversation consisting of a single user question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            turns: vec![question.into()],
        }
    }

    pub fn push(&mut self, turn: impl Into<String>) {
        self.turns.push(turn.into());
    }

    /// Turns paired with the role implied by their position
    pub fn messages(&self) -> impl Iterator<Item = (Role, &str)> {
        self.turns.iter().enumerate().map(|(i, turn)| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            (role, turn.as_str())
        })
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// One `data:` payload of a streamed chat completion
///
/// ```json
/// {"id":"chatcmpl-123","choices":[{"index":0,"delta":{"content":"Hello"}}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// Text added by the first choice, or `""`
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or("")
    }
}
