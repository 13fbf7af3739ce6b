//! Remote object directory service.
//!
//! The resolver and the sync orchestrator only talk to the remote system
//! through [`DirectoryService`]. Retry and backoff live in [`Retrying`], a
//! decorator around any directory implementation, so neither caller carries
//! its own retry loop.

mod notion;
mod retry;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ObjectKind;

pub use notion::NotionDirectory;
pub use retry::{RetryPolicy, Retrying};

/// Failures reported by a directory service.
///
/// Rate limiting and transient failures are retryable; the rest are not.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// Convenience alias for results of directory calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Minimal description of a remote object returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub id: String,
    pub kind: ObjectKind,
    pub title: String,
}

/// One page of listing results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryPage {
    pub summaries: Vec<ObjectSummary>,
    /// Cursor for the next page; `None` when the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// Extended metadata for a single remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetail {
    pub id: String,
    pub kind: ObjectKind,
    pub title: String,
    pub url: Option<String>,
    pub last_edited_time: Option<DateTime<Utc>>,
    pub archived: bool,
    /// Property name to property type.
    pub properties: BTreeMap<String, String>,
}

/// A single remote search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub kind: ObjectKind,
    pub title: String,
}

/// Remote directory of workspace objects.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Lists object summaries, one page per call. Pass the previous page's
    /// `next_cursor` to continue.
    async fn list_summaries(&self, cursor: Option<&str>) -> RemoteResult<SummaryPage>;

    /// Fetches extended detail for one object.
    async fn get_detail(&self, id: &str, kind: ObjectKind) -> RemoteResult<ObjectDetail>;

    /// Searches objects of `kind` by title.
    async fn search(&self, query: &str, kind: ObjectKind) -> RemoteResult<Vec<SearchHit>>;
}

#[async_trait]
impl<T: DirectoryService + ?Sized> DirectoryService for Arc<T> {
    async fn list_summaries(&self, cursor: Option<&str>) -> RemoteResult<SummaryPage> {
        (**self).list_summaries(cursor).await
    }

    async fn get_detail(&self, id: &str, kind: ObjectKind) -> RemoteResult<ObjectDetail> {
        (**self).get_detail(id, kind).await
    }

    async fn search(&self, query: &str, kind: ObjectKind) -> RemoteResult<Vec<SearchHit>> {
        (**self).search(query, kind).await
    }
}

/// Directory used when no remote credentials are configured. Every call
/// fails with `Unauthorized`, so resolution runs on cached data alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDirectory;

#[async_trait]
impl DirectoryService for OfflineDirectory {
    async fn list_summaries(&self, _cursor: Option<&str>) -> RemoteResult<SummaryPage> {
        Err(offline())
    }

    async fn get_detail(&self, _id: &str, _kind: ObjectKind) -> RemoteResult<ObjectDetail> {
        Err(offline())
    }

    async fn search(&self, _query: &str, _kind: ObjectKind) -> RemoteResult<Vec<SearchHit>> {
        Err(offline())
    }
}

fn offline() -> RemoteError {
    RemoteError::Unauthorized("no remote directory configured".to_string())
}
