//! Simple URL-building bang handlers

use super::{BangHandler, Redirect, query_escape};

/// Placeholder substituted by [`TemplateHandler`]
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Default handler: full-text search on the primary search engine
#[derive(Debug, Clone)]
pub struct SearchHandler {
    search_url: String,
}

impl SearchHandler {
    /// `search_url` is the engine's search endpoint without a query string,
    /// e.g. `https://kagi.com/search`
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
        }
    }
}

impl Default for SearchHandler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SEARCH_URL)
    }
}

impl BangHandler for SearchHandler {
    fn resolve(&self, query: &str) -> Redirect {
        Redirect::to(format!("{}?q={}", self.search_url, query_escape(query)))
    }
}

/// User-configured bang whose target is a URL with a `{query}` placeholder
#[derive(Debug, Clone)]
pub struct TemplateHandler {
    template: String,
}

impl TemplateHandler {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl BangHandler for TemplateHandler {
    fn resolve(&self, query: &str) -> Redirect {
        Redirect::to(self.template.replace(QUERY_PLACEHOLDER, &query_escape(query)))
    }
}
