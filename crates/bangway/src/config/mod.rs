use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::bang::QUERY_PLACEHOLDER;
use crate::error::{BangwayError, Result};

/// Search endpoint used when no bang matches
pub const DEFAULT_SEARCH_URL: &str = "https://kagi.com/search";

/// Instruction sent ahead of every conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant helping an experienced software engineer. The engineer is requesting information. Please provide the information requested in a concise manner without headings or unnecessary explanation. If appropriate, show a short code example in the language mentioned. Keep commentary to a minimum. Unless requested, do not include error handling code.";

/// File name looked up in each config location
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure for bangway
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Default search engine
    #[serde(default)]
    pub search: SearchConfig,
    /// Upstream chat API configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Extra bangs: name (with `!`) to URL template containing `{query}`
    #[serde(default)]
    pub bangs: BTreeMap<String, String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:69")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:69".to_string()
}

/// Default search engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint; the query is appended as `?q=`
    #[serde(default = "default_search_url")]
    pub url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
        }
    }
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

/// OpenAI-compatible chat completion API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Full chat completions endpoint URL
    #[serde(default = "default_chat_api_url")]
    pub api_url: String,
    /// API key; read from `api_key_env` when absent
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Output token budget per answer
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    /// Request timeout in seconds, covering the whole streamed answer
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
    /// System instruction sent before the conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: default_chat_api_url(),
            api_key: None,
            api_key_env: default_chat_api_key_env(),
            model: default_chat_model(),
            max_completion_tokens: default_max_completion_tokens(),
            timeout_secs: default_chat_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_chat_api_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_chat_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_chat_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_max_completion_tokens() -> u32 {
    1000
}

fn default_chat_timeout_secs() -> u64 {
    300
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl ChatConfig {
    /// Resolve the API key from the config file or the environment
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }

        match env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(BangwayError::Config(format!(
                "missing chat API key: set chat.api_key or the {} environment variable",
                self.api_key_env
            ))),
        }
    }
}

impl Config {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BangwayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| BangwayError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from an explicit path, or the first config file found in the
    /// default locations, or fall back to defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Check everything that would otherwise fail at request time
    pub fn validate(&self) -> Result<()> {
        self.server
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                BangwayError::Config(format!(
                    "Invalid listen address '{}': {e}",
                    self.server.listen_addr
                ))
            })?;

        url::Url::parse(&self.search.url).map_err(|e| {
            BangwayError::Config(format!("Invalid search URL '{}': {e}", self.search.url))
        })?;

        url::Url::parse(&self.chat.api_url).map_err(|e| {
            BangwayError::Config(format!("Invalid chat API URL '{}': {e}", self.chat.api_url))
        })?;

        for (name, template) in &self.bangs {
            if !name.starts_with('!') || name.len() < 2 || name.contains(char::is_whitespace) {
                return Err(BangwayError::Config(format!(
                    "Invalid bang name '{name}': must be '!' followed by a word"
                )));
            }
            if !template.contains(QUERY_PLACEHOLDER) {
                return Err(BangwayError::Config(format!(
                    "Bang '{name}' template must contain {QUERY_PLACEHOLDER}"
                )));
            }
        }

        Ok(())
    }
}

/// Config file locations, most specific first
///
/// The file next to the executable lets a service manager launch the binary
/// without a working directory or home.
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".bangway").join(CONFIG_FILE_NAME)),
        dirs::config_dir().map(|c| c.join("bangway").join(CONFIG_FILE_NAME)),
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME))),
        Some(PathBuf::from(CONFIG_FILE_NAME)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:69");
        assert_eq!(config.search.url, "https://kagi.com/search");
        assert_eq!(
            config.chat.api_url,
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert!(config.chat.api_key.is_none());
        assert_eq!(config.chat.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.chat.model, "llama-3.3-70b-versatile");
        assert_eq!(config.chat.max_completion_tokens, 1000);
        assert_eq!(config.chat.timeout_secs, 300);
        assert_eq!(config.chat.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(config.bangs.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[server]
listen_addr = "0.0.0.0:8080"

[search]
url = "https://duckduckgo.com/"

[chat]
api_url = "http://localhost:11434/v1/chat/completions"
api_key = "gsk-test"
model = "llama3"
max_completion_tokens = 256
timeout_secs = 60

[bangs]
"!w" = "https://en.wikipedia.org/w/index.php?search={query}"
"!gh" = "https://github.com/search?q={query}"
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse TOML");

        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.search.url, "https://duckduckgo.com/");
        assert_eq!(
            config.chat.api_url,
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(config.chat.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.chat.model, "llama3");
        assert_eq!(config.chat.max_completion_tokens, 256);
        assert_eq!(config.chat.timeout_secs, 60);
        assert_eq!(config.chat.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.bangs.len(), 2);
        assert_eq!(
            config.bangs["!gh"],
            "https://github.com/search?q={query}"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_deserialization() {
        let toml_str = r#"
[chat]
api_key = "gsk-test"
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse partial TOML");

        assert_eq!(config.server.listen_addr, "127.0.0.1:69");
        assert_eq!(config.chat.model, "llama-3.3-70b-versatile");
        assert_eq!(config.chat.api_key().unwrap(), "gsk-test");
    }

    #[test]
    fn test_api_key_from_env() {
        let toml_str = r#"
[chat]
api_key_env = "BANGWAY_TEST_KEY_FROM_ENV"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();

        unsafe { env::set_var("BANGWAY_TEST_KEY_FROM_ENV", "env-key") };
        assert_eq!(config.chat.api_key().unwrap(), "env-key");
        unsafe { env::remove_var("BANGWAY_TEST_KEY_FROM_ENV") };
    }

    #[test]
    fn test_api_key_missing() {
        let toml_str = r#"
[chat]
api_key = "   "
api_key_env = "BANGWAY_TEST_KEY_MISSING"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();

        unsafe { env::remove_var("BANGWAY_TEST_KEY_MISSING") };
        let err = config.chat.api_key().unwrap_err().to_string();
        assert!(err.contains("BANGWAY_TEST_KEY_MISSING"));
    }

    #[test]
    fn test_validate_rejects_bad_listen_addr() {
        let mut config = Config::default();
        config.server.listen_addr = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bangs() {
        let mut config = Config::default();
        config
            .bangs
            .insert("w".to_string(), "https://example.com/?q={query}".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .bangs
            .insert("!".to_string(), "https://example.com/?q={query}".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .bangs
            .insert("!w".to_string(), "https://example.com/".to_string());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("{query}"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten_addr = \"127.0.0.1:8069\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8069");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, BangwayError::Config(_)));
    }

    #[test]
    fn test_from_file_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nlisten_addr = ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn test_default_config_paths_end_with_working_directory() {
        let paths = default_config_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("config.toml")));
    }
}
