//! Error types for bangway

use thiserror::Error;

/// Startup errors; request-time failures live in [`crate::gateway::GatewayError`]
#[derive(Error, Debug)]
pub enum BangwayError {
    /// Configuration errors (missing API key, invalid bang table, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server setup errors (bind failure, client construction)
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias for bangway operations
pub type Result<T> = std::result::Result<T, BangwayError>;
