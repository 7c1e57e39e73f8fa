//! Query tokenization and bang detection

/// A query split into whitespace-separated tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedQuery<'a> {
    /// Tokens in input order
    pub tokens: Vec<&'a str>,
    /// Index of the bang token, if the first or last token is one
    pub bang_index: Option<usize>,
}

/// Split `query` on whitespace and locate a bang at its first or last token
///
/// Tokens in the middle of the query are never treated as bangs, so
/// `cat !w facts` is a plain search.
pub fn tokenize(query: &str) -> TokenizedQuery<'_> {
    let tokens: Vec<&str> = query.split_whitespace().collect();

    let bang_index = match (tokens.first(), tokens.last()) {
        (Some(first), _) if is_bang(first) => Some(0),
        (_, Some(last)) if is_bang(last) => Some(tokens.len() - 1),
        _ => None,
    };

    TokenizedQuery { tokens, bang_index }
}

fn is_bang(token: &str) -> bool {
    token.starts_with('!')
}

impl<'a> TokenizedQuery<'a> {
    /// The bang token, including its leading `!`
    pub fn bang(&self) -> Option<&'a str> {
        self.bang_index.map(|i| self.tokens[i])
    }

    /// Every token except the bang, joined with single spaces
    pub fn residual(&self) -> String {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.bang_index)
            .map(|(_, token)| *token)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
