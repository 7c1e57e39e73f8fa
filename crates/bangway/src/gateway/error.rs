//! Request-time errors and their HTTP responses
//!
//! Only errors that happen before any response has been sent end up here.
//! Once a streamed answer has started, failures are absorbed by the relay.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::chat::ChatError;

/// Errors that can occur while handling a query
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The chat answer could not be started
    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl GatewayError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Chat(e) => e.category(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed ({}): {self}", self.category());

        let body = serde_json::json!({
            "error": {
                "type": self.category(),
                "message": self.to_string(),
            }
        });

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
