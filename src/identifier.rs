//! Recognizes URL and raw-ID input shapes.
//!
//! Canonical IDs are 32 lowercase hex characters with no separators. Users
//! paste them in several shapes: a share URL whose last path segment ends in
//! the ID (often after a title slug), a dashed UUID, or the bare hex string.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{ResolverError, Result};
use crate::types::normalize;

/// Length of a canonical ID in hex characters.
pub const ID_LEN: usize = 32;

/// Host markers recognized when no configuration is supplied.
pub const DEFAULT_HOST_MARKERS: &[&str] = &["notion.so", "notion.site"];

/// Hex-looking input at least this long is treated as an attempted ID.
const MIN_ID_LIKE_LEN: usize = 20;

/// Trailing ID of a URL path segment, dashed (8-4-4-4-12) or not. The ID
/// must start the segment or follow a non-hex character, so longer hex runs
/// are not truncated to their last 32 characters.
static TRAILING_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^0-9a-f])([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9a-f]{32})$",
    )
    .expect("valid trailing id regex")
});

/// What an input string turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedIdentifier {
    /// A canonical ID extracted from a URL.
    Url(String),
    /// A bare canonical ID.
    Id(String),
    /// A free-text name, normalized for cache lookup.
    Name(String),
}

impl ParsedIdentifier {
    /// The canonical ID, if the input carried one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Url(id) | Self::Id(id) => Some(id),
            Self::Name(_) => None,
        }
    }
}

/// Identifier parser configured with the host markers of the remote system.
#[derive(Debug, Clone)]
pub struct IdentifierParser {
    host_markers: Vec<String>,
}

impl Default for IdentifierParser {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_MARKERS.iter().map(|s| s.to_string()).collect())
    }
}

impl IdentifierParser {
    pub fn new(host_markers: Vec<String>) -> Self {
        let host_markers = host_markers.into_iter().map(|m| normalize(&m)).collect();
        Self { host_markers }
    }

    /// Classifies `input` as URL, bare ID, or name.
    ///
    /// Whitespace is trimmed first. Empty input, a URL without a trailing ID,
    /// and hex-looking strings of the wrong length are validation errors.
    pub fn parse(&self, input: &str) -> Result<ParsedIdentifier> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ResolverError::validation(input, "identifier is empty"));
        }

        if self.is_url(trimmed) {
            return extract_url_id(trimmed).map(ParsedIdentifier::Url);
        }

        let stripped: String = trimmed.chars().filter(|c| *c != '-').collect();
        if stripped.len() == ID_LEN && stripped.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(ParsedIdentifier::Id(stripped.to_ascii_lowercase()));
        }

        if looks_like_id(trimmed, &stripped) {
            return Err(ResolverError::validation(
                trimmed,
                format!(
                    "expected {ID_LEN} hex characters, found {}",
                    stripped.len()
                ),
            ));
        }

        Ok(ParsedIdentifier::Name(normalize(trimmed)))
    }

    fn is_url(&self, s: &str) -> bool {
        let lower = s.to_ascii_lowercase();
        lower.starts_with("http://")
            || lower.starts_with("https://")
            || self.host_markers.iter().any(|m| lower.contains(m.as_str()))
    }
}

/// Parses `input` with the default host markers.
pub fn parse_identifier(input: &str) -> Result<ParsedIdentifier> {
    IdentifierParser::default().parse(input)
}

/// Strips dashes and lowercases an ID.
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn extract_url_id(url: &str) -> Result<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    TRAILING_ID
        .captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_id(m.as_str()))
        .ok_or_else(|| ResolverError::validation(url, "URL does not end with an object ID"))
}

fn looks_like_id(original: &str, stripped: &str) -> bool {
    original.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
        && stripped.chars().any(|c| c.is_ascii_digit())
        && stripped.len() >= MIN_ID_LIKE_LEN
}
