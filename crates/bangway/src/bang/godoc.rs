//! `!go` handler: jump straight to Go standard library documentation
//!
//! Accepts a package's import path (`net/http`), its short name (`http`),
//! or a `package.Symbol` pair (`http.Client`), and falls back to a
//! pkg.go.dev search for anything else.

use std::collections::{HashMap, HashSet};

use super::packages::GO_STANDARD_PACKAGES;
use super::{BangHandler, Redirect, query_escape};

/// Documentation site root
pub const GO_DOC_URL: &str = "https://pkg.go.dev";

/// Lookup tables over a set of Go package import paths
///
/// Short names are the last path segment. When several packages share a
/// short name, the one listed last wins, so `rand` resolves to `math/rand`
/// rather than `crypto/rand` and `template` to `text/template`.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    long_names: HashSet<String>,
    short_names: HashMap<String, String>,
}

impl PackageIndex {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for package in packages {
            let package = package.as_ref();
            let short = package.rsplit('/').next().unwrap_or(package);
            index.long_names.insert(package.to_string());
            index
                .short_names
                .insert(short.to_string(), package.to_string());
        }
        index
    }

    /// Index of the Go standard library
    pub fn standard_library() -> Self {
        Self::new(GO_STANDARD_PACKAGES.iter())
    }

    pub fn contains_long(&self, name: &str) -> bool {
        self.long_names.contains(name)
    }

    /// Import path for a short package name
    pub fn long_for_short(&self, short: &str) -> Option<&str> {
        self.short_names.get(short).map(String::as_str)
    }
}

/// Resolves Go package and symbol names to pkg.go.dev pages
#[derive(Debug, Clone)]
pub struct GoDocHandler {
    index: PackageIndex,
    base_url: String,
}

impl GoDocHandler {
    pub fn new(index: PackageIndex, base_url: impl Into<String>) -> Self {
        Self {
            index,
            base_url: base_url.into(),
        }
    }

    pub fn standard_library() -> Self {
        Self::new(PackageIndex::standard_library(), GO_DOC_URL)
    }

    fn package_page(&self, package: &str) -> String {
        // Import paths contain '/', which is part of the docs URL path.
        format!("{}/{}", self.base_url, package)
    }
}

impl BangHandler for GoDocHandler {
    fn resolve(&self, query: &str) -> Redirect {
        // net/http -> /net/http
        if self.index.contains_long(query) {
            return Redirect::to(self.package_page(query));
        }

        // http -> /net/http
        if let Some(package) = self.index.long_for_short(query) {
            return Redirect::to(self.package_page(package));
        }

        // http.Client -> /net/http#Client
        if let Some((package, symbol)) = query.split_once('.') {
            if let Some(package) = self.index.long_for_short(package) {
                return Redirect::to(format!(
                    "{}#{}",
                    self.package_page(package),
                    query_escape(symbol)
                ));
            }
        }

        Redirect::to(format!(
            "{}/search?utm_source=godoc&q={}",
            self.base_url,
            query_escape(query)
        ))
    }
}
