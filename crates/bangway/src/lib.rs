//! Bangway - personal search gateway
//!
//! Routes a single search query either to a bang handler (a redirect to a
//! specific site), to the default search engine, or, for queries ending in
//! `?`, to an LLM whose streamed answer is relayed back as HTML.

pub mod bang;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod testing;

pub use error::{BangwayError, Result};
