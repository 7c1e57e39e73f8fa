//! Bang parsing and redirect resolution
//!
//! A bang is a `!`-prefixed token at the start or end of a query that picks
//! the site a query is sent to (`!go http.Client`, `cat facts !w`). Queries
//! without a bang go to the default search handler.

mod godoc;
mod handlers;
mod packages;
mod registry;
mod tokenizer;

pub use godoc::{GoDocHandler, PackageIndex};
pub use handlers::{QUERY_PLACEHOLDER, SearchHandler, TemplateHandler};
pub use packages::GO_STANDARD_PACKAGES;
pub use registry::{BangRegistry, DEFAULT_BANG, GO_BANG};
pub use tokenizer::{TokenizedQuery, tokenize};

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;

/// Marker at the end of a query that asks for a chat answer instead of a redirect
pub const CONTINUATION_MARKER: char = '?';

/// A resolved redirect target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Absolute URL the client is sent to
    pub location: String,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Status used for every bang redirect
    pub fn status(&self) -> StatusCode {
        StatusCode::FOUND
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status().as_u16(), self.location)
    }
}

/// Resolves a residual query into a redirect target
///
/// Handlers are pure: they own whatever lookup tables they need, built once
/// at startup, and never mutate them per request.
pub trait BangHandler: Send + Sync + fmt::Debug {
    fn resolve(&self, query: &str) -> Redirect;
}

/// What the gateway should do with a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRoute {
    /// Send the client elsewhere
    Redirect(Redirect),
    /// Ask the chat API and stream the answer
    Chat,
}

/// Decide between a bang redirect, a chat answer, and a default search
///
/// A bang always wins, even when the query also ends in `?`.
pub fn route_query(registry: &BangRegistry, query: &str) -> QueryRoute {
    let tokenized = tokenize(query);

    if let Some(bang) = tokenized.bang() {
        return QueryRoute::Redirect(registry.dispatch(Some(bang), &tokenized.residual()));
    }

    if query.ends_with(CONTINUATION_MARKER) {
        return QueryRoute::Chat;
    }

    QueryRoute::Redirect(registry.dispatch(None, query))
}

/// Form-encode a string for use in a query parameter or fragment
///
/// Spaces become `+`, matching what search engines expect in `q=`. Only
/// ASCII alphanumerics and `-_.~` are left as they are, like Go's
/// `url.QueryEscape`.
pub fn query_escape(input: &str) -> String {
    // form_urlencoded keeps `*` and escapes `~`; swap both. Escaped bytes
    // arrive one per part, unescaped runs as a single part.
    url::form_urlencoded::byte_serialize(input.as_bytes())
        .map(|part| match part {
            "%7E" => Cow::Borrowed("~"),
            run if run.contains('*') => Cow::Owned(run.replace('*', "%2A")),
            other => Cow::Borrowed(other),
        })
        .collect()
}
