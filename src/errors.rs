use thiserror::Error;

use crate::remote::RemoteError;
use crate::types::{ObjectKind, ResolutionStage};

/// Errors that can occur while resolving identifiers or maintaining the
/// workspace cache.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("invalid identifier '{input}': {message}")]
    Validation { input: String, message: String },

    #[error("no {kind} found matching '{input}' (tried: {})", format_stages(.attempted))]
    NotFound {
        input: String,
        kind: ObjectKind,
        /// Cascade stages that ran, in order.
        attempted: Vec<ResolutionStage>,
        /// Near-miss titles that scored below the fuzzy threshold.
        suggestions: Vec<String>,
        /// Set when the final remote search could not be completed.
        remote_error: Option<String>,
    },

    #[error("'{input}' matches {} {kind} entries", .candidates.len())]
    Ambiguous {
        input: String,
        kind: ObjectKind,
        /// `(id, title)` pairs of every matching entry.
        candidates: Vec<(String, String)>,
    },

    #[error("cache file corrupted: {message} (path: {path})")]
    CacheCorrupted { path: String, message: String },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolverError {
    /// Shorthand for a [`ResolverError::Validation`].
    pub fn validation(input: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

fn format_stages(stages: &[ResolutionStage]) -> String {
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias for results using `ResolverError`.
pub type Result<T> = std::result::Result<T, ResolverError>;
