//! Streaming client for OpenAI-compatible chat completion APIs

use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::error::{BangwayError, Result};

use super::{ByteStream, ChatError, Conversation, Role};

/// OpenAI-compatible streaming chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_completion_tokens: u32,
    pub stream: bool,
}

/// Message in the chat completion request
#[derive(Debug, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Client for the upstream chat API
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: ChatConfig,
    api_key: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client, resolving the API key from the config or environment
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ChatConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BangwayError::Server(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "ChatClient initialized with model: {}, api_url: {}",
            config.model, config.api_url
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }

    /// Request body for `conversation`: system prompt first, then the turns
    pub fn build_request(&self, conversation: &Conversation) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message {
            role: Role::System,
            content: self.config.system_prompt.clone(),
        });
        messages.extend(conversation.messages().map(|(role, content)| Message {
            role,
            content: content.to_string(),
        }));

        ChatCompletionRequest {
            messages,
            model: self.config.model.clone(),
            max_completion_tokens: self.config.max_completion_tokens,
            stream: true,
        }
    }

    /// Start a streamed completion and return the response body
    ///
    /// Fails before any output exists: on connection errors and on a
    /// non-success status, whose body is read for the error message.
    pub async fn request_completion(
        &self,
        conversation: &Conversation,
    ) -> std::result::Result<ByteStream, ChatError> {
        let request = self.build_request(conversation);
        debug!(
            "Calling chat API at: {} ({} messages)",
            self.config.api_url,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Request(format!("Request timed out: {e}"))
                } else if e.is_connect() {
                    ChatError::Request(format!("Failed to connect to chat API: {e}"))
                } else {
                    ChatError::Request(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Transport(e.to_string())))
            .boxed())
    }
}
