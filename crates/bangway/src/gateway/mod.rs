mod error;
mod server;

pub use error::GatewayError;
pub use server::{AppState, GatewayServer, SearchParams, create_router};
