//! Integration tests for bang detection and redirect resolution
//!
//! Covers tokenization, residual reconstruction, the default search handler,
//! `!go` resolution priority, and config-defined template bangs.

use std::collections::BTreeMap;

use bangway::bang::{BangRegistry, QueryRoute, Redirect, route_query, tokenize};
use bangway::config::Config;

fn redirect_for(registry: &BangRegistry, query: &str) -> String {
    match route_query(registry, query) {
        QueryRoute::Redirect(Redirect { location }) => location,
        QueryRoute::Chat => panic!("expected a redirect for {query:?}, got chat"),
    }
}

// =============================================================================
// Tokenization
// =============================================================================

#[test]
fn test_bang_only_detected_at_edges() {
    assert_eq!(tokenize("!w cat facts").bang_index, Some(0));
    assert_eq!(tokenize("cat facts !w").bang_index, Some(2));
    assert_eq!(tokenize("cat !w facts").bang_index, None);
}

#[test]
fn test_first_token_wins_when_both_edges_are_bangs() {
    let tokenized = tokenize("!go fmt !w");
    assert_eq!(tokenized.bang(), Some("!go"));
    assert_eq!(tokenized.residual(), "fmt !w");
}

#[test]
fn test_residual_drops_only_the_bang() {
    let tokenized = tokenize("net/http !go");
    assert_eq!(tokenized.bang(), Some("!go"));
    assert_eq!(tokenized.residual(), "net/http");

    let tokenized = tokenize("  !go   http.Client  ");
    assert_eq!(tokenized.tokens, vec!["!go", "http.Client"]);
    assert_eq!(tokenized.residual(), "http.Client");
}

#[test]
fn test_single_bang_token_has_empty_residual() {
    let tokenized = tokenize("!go");
    assert_eq!(tokenized.bang(), Some("!go"));
    assert_eq!(tokenized.residual(), "");
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_default_search_round_trip() {
    let registry = BangRegistry::builtin();
    assert_eq!(
        redirect_for(&registry, "golang"),
        "https://kagi.com/search?q=golang"
    );
    assert_eq!(
        redirect_for(&registry, "rust async traits"),
        "https://kagi.com/search?q=rust+async+traits"
    );
}

#[test]
fn test_go_exact_package() {
    let registry = BangRegistry::builtin();
    assert_eq!(
        redirect_for(&registry, "net/http !go"),
        "https://pkg.go.dev/net/http"
    );
    assert_eq!(redirect_for(&registry, "!go fmt"), "https://pkg.go.dev/fmt");
}

#[test]
fn test_go_short_name_resolves_to_long_name() {
    let registry = BangRegistry::builtin();
    assert_eq!(
        redirect_for(&registry, "!go http"),
        "https://pkg.go.dev/net/http"
    );
}

#[test]
fn test_go_symbol_gets_fragment() {
    let registry = BangRegistry::builtin();
    assert_eq!(
        redirect_for(&registry, "!go http.Client"),
        "https://pkg.go.dev/net/http#Client"
    );
    assert_eq!(
        redirect_for(&registry, "!go strings.Builder.WriteString"),
        "https://pkg.go.dev/strings#Builder.WriteString"
    );
}

#[test]
fn test_go_unknown_falls_back_to_search() {
    let registry = BangRegistry::builtin();
    assert_eq!(
        redirect_for(&registry, "!go nonexistent.Thing"),
        "https://pkg.go.dev/search?utm_source=godoc&q=nonexistent.Thing"
    );
}

#[test]
fn test_unknown_bang_searches_literal_text() {
    let registry = BangRegistry::builtin();
    assert_eq!(
        redirect_for(&registry, "!nope cats"),
        "https://kagi.com/search?q=%21nope+cats"
    );
}

#[test]
fn test_config_template_bang() {
    let mut bangs = BTreeMap::new();
    bangs.insert(
        "!w".to_string(),
        "https://en.wikipedia.org/w/index.php?search={query}".to_string(),
    );
    let config = Config {
        bangs,
        ..Config::default()
    };
    config.validate().unwrap();

    let registry = BangRegistry::from_config(&config).unwrap();
    assert_eq!(registry.names(), vec!["!go", "!w"]);
    assert_eq!(
        redirect_for(&registry, "cat facts !w"),
        "https://en.wikipedia.org/w/index.php?search=cat+facts"
    );
}

#[test]
fn test_config_bang_cannot_shadow_builtin() {
    let mut bangs = BTreeMap::new();
    bangs.insert("!go".to_string(), "https://go.dev/?q={query}".to_string());
    let config = Config {
        bangs,
        ..Config::default()
    };

    assert!(BangRegistry::from_config(&config).is_err());
}

#[test]
fn test_bang_with_question_mark_still_redirects() {
    let registry = BangRegistry::builtin();
    assert!(matches!(
        route_query(&registry, "!go fmt?"),
        QueryRoute::Redirect(_)
    ));
    assert_eq!(route_query(&registry, "what is fmt?"), QueryRoute::Chat);
}
