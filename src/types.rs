use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aliases::generate_aliases;
use crate::identifier::normalize_id;

/// Schema version written into every cache document.
pub const CACHE_VERSION: &str = "1";

/// Maximum number of sync error records retained in the cache.
pub const MAX_SYNC_ERRORS: usize = 20;

/// Kinds of remote objects the resolver can target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    Database,
    Page,
}

#[allow(clippy::should_implement_trait)]
impl ObjectKind {
    /// Returns the string representation of this object kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Database => "database",
            ObjectKind::Page => "page",
        }
    }

    /// Parses a string into an `ObjectKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<ObjectKind> {
        match s.trim().to_lowercase().as_str() {
            "database" | "db" => Some(ObjectKind::Database),
            "page" => Some(ObjectKind::Page),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages of the resolution cascade, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    Identifier,
    ExactTitle,
    Alias,
    Fuzzy,
    Sync,
    RemoteSearch,
}

impl ResolutionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::ExactTitle => "exact_title",
            Self::Alias => "alias",
            Self::Fuzzy => "fuzzy",
            Self::Sync => "sync",
            Self::RemoteSearch => "remote_search",
        }
    }
}

/// Summary of one remote object, as stored in the workspace cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub id: String,
    #[serde(default)]
    pub kind: ObjectKind,
    pub title: String,
    pub title_normalized: String,
    pub aliases: Vec<String>,
    pub last_edited_time: Option<DateTime<Utc>>,
    pub url: Option<String>,
    /// Property name to property type.
    #[serde(default)]
    pub property_summary: BTreeMap<String, String>,
    #[serde(default)]
    pub archived: bool,
}

impl CacheEntry {
    /// Builds an entry with a canonical ID and the normalized title and
    /// aliases derived from `title`.
    pub fn new(id: impl Into<String>, kind: ObjectKind, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: normalize_id(&id.into()),
            kind,
            title_normalized: normalize(&title),
            aliases: generate_aliases(&title),
            title,
            last_edited_time: None,
            url: None,
            property_summary: BTreeMap::new(),
            archived: false,
        }
    }

    /// Returns true if `needle` is one of this entry's aliases.
    pub fn has_alias(&self, needle: &str) -> bool {
        self.aliases.iter().any(|a| a == needle)
    }
}

/// Diagnostic record of a partial sync failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// The persisted root document of the workspace cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceCache {
    pub version: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub entries: Vec<CacheEntry>,
    #[serde(default)]
    pub sync_errors: Vec<SyncErrorRecord>,
}

impl Default for WorkspaceCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            last_sync: None,
            entries: Vec::new(),
            sync_errors: Vec::new(),
        }
    }
}

impl WorkspaceCache {
    /// Replaces the entry with the same ID, or appends it. `last_sync` is untouched.
    pub fn upsert(&mut self, mut entry: CacheEntry) {
        entry.id = normalize_id(&entry.id);
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Appends a sync error record, dropping the oldest beyond [`MAX_SYNC_ERRORS`].
    pub fn record_sync_error(&mut self, message: impl Into<String>) {
        self.sync_errors.push(SyncErrorRecord {
            timestamp: Utc::now(),
            message: message.into(),
        });
        if self.sync_errors.len() > MAX_SYNC_ERRORS {
            let excess = self.sync_errors.len() - MAX_SYNC_ERRORS;
            self.sync_errors.drain(..excess);
        }
    }

    /// Milliseconds since the last successful sync, or `None` if never synced.
    pub fn age_ms(&self) -> Option<u64> {
        self.last_sync
            .map(|t| (Utc::now() - t).num_milliseconds().max(0) as u64)
    }

    /// True if the cache has never synced or is older than `ttl_ms`.
    pub fn is_stale(&self, ttl_ms: u64) -> bool {
        match self.age_ms() {
            Some(age) => age > ttl_ms,
            None => true,
        }
    }
}

/// Statistics about the on-disk cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: usize,
    pub age_ms: Option<u64>,
    pub size_bytes: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub sync_errors: usize,
}

/// Result of a completed sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Listing pages fetched.
    pub pages: usize,
    /// Unique summaries returned by the listing.
    pub listed: usize,
    /// Entries written to the cache.
    pub cached: usize,
    /// Items whose detail could not be fetched.
    pub failed: usize,
    /// True if the listing stopped early on an error.
    pub listing_truncated: bool,
    pub duration_ms: u64,
}

impl SyncStats {
    /// True if some items failed or the listing was cut short.
    pub fn is_partial(&self) -> bool {
        self.failed > 0 || self.listing_truncated
    }
}

/// Why a sync request did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Another process holds a fresh sync lock.
    LockHeld,
    /// The cache is younger than the configured TTL.
    Fresh,
}

/// Outcome of a sync request.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Completed(SyncStats),
    Skipped(SkipReason),
}

/// A successfully resolved identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
    pub id: String,
    pub stage: ResolutionStage,
    /// Title of the matched object, when known.
    pub title: Option<String>,
}

/// Filter for listing cached entries.
#[derive(Debug, Clone, Default)]
pub struct CacheFilter {
    pub kind: Option<ObjectKind>,
    /// Case-insensitive substring matched against the title and aliases.
    pub query: Option<String>,
    pub include_archived: bool,
}

impl CacheFilter {
    pub fn matches(&self, entry: &CacheEntry) -> bool {
        if !self.include_archived && entry.archived {
            return false;
        }
        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }
        match &self.query {
            Some(q) => {
                let q = normalize(q);
                entry.title_normalized.contains(&q) || entry.aliases.iter().any(|a| a.contains(&q))
            }
            None => true,
        }
    }
}

/// Lowercases and trims a title or query.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
