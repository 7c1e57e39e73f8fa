//! Bang name to handler lookup

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{BangwayError, Result};

use super::{BangHandler, GoDocHandler, Redirect, SearchHandler, TemplateHandler};

/// Name of the default entry
pub const DEFAULT_BANG: &str = "";

/// Built-in `!go` bang
pub const GO_BANG: &str = "!go";

/// Immutable mapping from bang name (with its `!`) to handler
///
/// Built once at startup and shared read-only between requests. Every
/// constructor installs the default entry (`""`), which is also kept
/// separately so a lookup can always fall back to it.
#[derive(Debug, Clone)]
pub struct BangRegistry {
    handlers: HashMap<String, Arc<dyn BangHandler>>,
    fallback: Arc<dyn BangHandler>,
}

impl BangRegistry {
    /// Registry with the default search engine and `!go`
    pub fn builtin() -> Self {
        Self::with_search_url(crate::config::DEFAULT_SEARCH_URL)
    }

    fn with_search_url(search_url: &str) -> Self {
        let fallback: Arc<dyn BangHandler> = Arc::new(SearchHandler::new(search_url));

        let mut handlers: HashMap<String, Arc<dyn BangHandler>> = HashMap::new();
        handlers.insert(DEFAULT_BANG.to_string(), fallback.clone());
        handlers.insert(
            GO_BANG.to_string(),
            Arc::new(GoDocHandler::standard_library()),
        );

        Self { handlers, fallback }
    }

    /// Built-in bangs plus the `[bangs]` templates from the config file
    ///
    /// Config bangs are checked when the config is validated; this only
    /// rejects names that would shadow a built-in.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::with_search_url(&config.search.url);

        for (name, template) in &config.bangs {
            if registry.handlers.contains_key(name) {
                return Err(BangwayError::Config(format!(
                    "bang '{name}' shadows a built-in bang"
                )));
            }
            registry
                .handlers
                .insert(name.clone(), Arc::new(TemplateHandler::new(template.clone())));
        }

        tracing::debug!(
            "Bang registry built with {} entries",
            registry.handlers.len()
        );
        Ok(registry)
    }

    /// Resolve a redirect for `query`
    ///
    /// `bang` of `None` selects the default handler. An unknown bang is folded
    /// back into the query and handed to the default handler once, so
    /// `!typo cats` searches for the literal text `!typo cats`.
    pub fn dispatch(&self, bang: Option<&str>, query: &str) -> Redirect {
        let name = bang.unwrap_or(DEFAULT_BANG);

        match self.handlers.get(name) {
            Some(handler) => handler.resolve(query),
            None => {
                tracing::debug!("Unknown bang '{name}', falling back to default search");
                self.fallback.resolve(&format!("{name} {query}"))
            }
        }
    }

    /// Registered bang names, sorted, without the default entry
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .handlers
            .keys()
            .map(String::as_str)
            .filter(|name| *name != DEFAULT_BANG)
            .collect();
        names.sort_unstable();
        names
    }
}
