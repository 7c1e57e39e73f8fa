//! HTTP search gateway
//!
//! Serves a single search endpoint, `GET /?q=...`:
//! - queries with a bang, or without a trailing `?`, get a 302 redirect
//! - queries ending in `?` get a streamed HTML answer from the chat API

use axum::{
    Json, Router,
    body::Body,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::stream::{self, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::bang::{BangRegistry, QueryRoute, Redirect, route_query};
use crate::chat::{
    ChannelSink, ChatClient, Conversation, RelayError, StreamRelay, chunk_stream, first_content,
};
use crate::config::ServerConfig;
use crate::error::{BangwayError, Result};

use super::GatewayError;

/// Shared, read-only application state for all handlers
pub struct AppState {
    /// Bang handlers, built once at startup
    pub registry: BangRegistry,
    /// Client for streamed chat answers
    pub chat: ChatClient,
}

/// Query string of the search endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// The search query; absent means empty
    pub q: String,
}

impl SearchParams {
    /// Parse a raw query string, keeping the first `q` when it repeats
    pub fn from_query(raw: Option<&str>) -> Self {
        let q = raw
            .and_then(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .find(|(key, _)| key == "q")
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default();
        Self { q }
    }
}

/// The gateway server
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Bind the listener and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| BangwayError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!(
            "Bangs registered: {}",
            self.state.registry.names().join(", ")
        );

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BangwayError::Server(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!("Search gateway listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| BangwayError::Server(format!("Server error: {e}")))?;

        tracing::info!("Search gateway shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(search_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let params = SearchParams::from_query(raw.as_deref());

    match route_query(&state.registry, &params.q) {
        QueryRoute::Redirect(redirect) => {
            tracing::debug!("Redirecting {:?} to {}", params.q, redirect.location);
            redirect.into_response()
        }
        QueryRoute::Chat => chat_response(&state, params.q).await,
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        (self.status(), [(header::LOCATION, self.location)]).into_response()
    }
}

/// Start a chat answer and stream it back as HTML
///
/// The status stays open until the answer has its first text (or ends
/// without any), so upstream failures up to that point are still a 500.
/// After that the relay runs in its own task, feeding the body one flushed
/// fragment at a time.
async fn chat_response(state: &AppState, query: String) -> Response {
    tracing::info!("Starting chat answer ({} chars)", query.len());

    let conversation = Conversation::new(query.clone());
    let body = match state.chat.request_completion(&conversation).await {
        Ok(body) => body,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let mut chunks = Box::pin(chunk_stream(body));
    let first = match first_content(&mut chunks).await {
        Ok(first) => first,
        Err(e) => return GatewayError::from(e).into_response(),
    };

    let (mut sink, frames) = ChannelSink::channel();

    tokio::spawn(async move {
        let answer = stream::iter(first.map(Ok)).chain(chunks);
        let relay = StreamRelay::new(&query, &mut sink);
        match relay.run(answer).await {
            Ok(report) => tracing::debug!(
                "Chat answer finished: {:?}, {} fragments, {} skipped",
                report.state,
                report.fragments,
                report.skipped
            ),
            Err(RelayError::Disconnected) => {
                tracing::debug!("Client disconnected during chat answer")
            }
        }
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(frames),
    )
        .into_response()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
