//! Keyword guard for free-form Cypher.
//!
//! A syntactic allow/deny filter, not a parser. Text is split on
//! `[.,;*\s)(]` and uppercased for keyword matching only; the original text
//! is what gets executed.
//!
//! String literals are not distinguished from code. A keyword inside a
//! literal is matched like any other token, and a write assembled inside a
//! literal (e.g. handed to a procedure that runs Cypher from a string) is
//! not seen at all. The guard is best-effort and is not an authorization
//! boundary.

use regex::Regex;
use serde::Serialize;

use annograph_core::config::QueryConfig;

pub const REQUIRED_KEYWORDS: [&str; 2] = ["MATCH", "RETURN"];
pub const FORBIDDEN_KEYWORDS: [&str; 5] = ["DETACH", "DELETE", "UPDATE", "SET", "MERGE"];

const LIMIT_KEYWORD: &str = "LIMIT";

fn is_separator(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | '*' | ')' | '(') || c.is_whitespace()
}

/// Uppercased, non-empty tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(is_separator)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Why a query was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "keyword", rename_all = "lowercase")]
pub enum Rejection {
    Missing(&'static str),
    Forbidden(&'static str),
}

impl Rejection {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Missing(k) | Self::Forbidden(k) => k,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(k) => write!(f, "Query must contain: {k}."),
            Self::Forbidden(k) => write!(f, "Query must not contain {k}."),
        }
    }
}

/// Outcome of [`QueryGuard::check`]. A rejected query must not be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GuardVerdict {
    Accepted {
        /// Text to execute, with the result ceiling applied.
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Rejected {
        reason: Rejection,
        message: String,
    },
}

impl GuardVerdict {
    fn rejected(reason: Rejection) -> Self {
        Self::Rejected {
            message: reason.to_string(),
            reason,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Accepted { query, .. } => Some(query),
            Self::Rejected { .. } => None,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Accepted { warning, .. } => warning.as_deref(),
            Self::Rejected { .. } => None,
        }
    }
}

/// Applies the result ceiling and the keyword allow/deny lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryGuard {
    limit: i64,
}

impl Default for QueryGuard {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl QueryGuard {
    /// `limit <= 0` disables the ceiling.
    pub fn new(limit: i64) -> Self {
        Self { limit }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.limit)
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Validate `text`, rewriting or appending `LIMIT` as needed.
    ///
    /// A `LIMIT` followed by something other than an integer literal is
    /// treated as absent, so the ceiling is appended.
    pub fn check(&self, text: &str) -> GuardVerdict {
        let tokens = tokenize(text);
        let mut query = text.to_string();
        let mut warning = None;

        if self.limit > 0 {
            match requested_limit(&tokens) {
                Some((literal, requested)) if requested > i128::from(self.limit) => {
                    query = self.rewrite_limit(&query, literal);
                    warning = Some(format!("LIMIT reset to {}", self.limit));
                    tracing::warn!(requested = %literal, ceiling = self.limit, "Limit exceeded");
                }
                Some(_) => {}
                None => {
                    let body = query.trim_end();
                    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
                    query = format!("{body} LIMIT {}", self.limit);
                }
            }
        }

        if let Some(missing) = REQUIRED_KEYWORDS
            .iter()
            .find(|k| !tokens.iter().any(|t| t == *k))
        {
            return GuardVerdict::rejected(Rejection::Missing(*missing));
        }
        if let Some(forbidden) = FORBIDDEN_KEYWORDS
            .iter()
            .find(|k| tokens.iter().any(|t| t == *k))
        {
            return GuardVerdict::rejected(Rejection::Forbidden(*forbidden));
        }

        GuardVerdict::Accepted { query, warning }
    }

    /// Replace every `LIMIT <literal>` (case-insensitive) with the ceiling.
    fn rewrite_limit(&self, query: &str, literal: &str) -> String {
        let pattern = format!(r"(?i)\b({LIMIT_KEYWORD}[.,;*\s)(]+){}\b", regex::escape(literal));
        match Regex::new(&pattern) {
            Ok(re) => re
                .replace_all(query, format!("${{1}}{}", self.limit).as_str())
                .into_owned(),
            Err(e) => {
                tracing::error!(error = %e, "Could not build LIMIT rewrite pattern");
                format!("{query} LIMIT {}", self.limit)
            }
        }
    }
}

/// The first `LIMIT` token and the integer after it. Digit strings too long
/// to parse still compare as exceeding any ceiling.
fn requested_limit(tokens: &[String]) -> Option<(&str, i128)> {
    let index = tokens.iter().position(|t| t == LIMIT_KEYWORD)?;
    let literal = tokens.get(index + 1)?.as_str();
    let value = literal.parse::<i128>().ok().or_else(|| {
        literal
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then_some(i128::MAX)
    })?;
    Some((literal, value))
}
