use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use super::{ensure_private_dir, write_atomic};
use crate::errors::{ResolverError, Result};
use crate::types::{CacheEntry, CacheStats, WorkspaceCache, CACHE_VERSION};

/// Name of the cache document inside the cache directory.
pub const CACHE_FILENAME: &str = "workspace-cache.json";

/// Persistent store for the [`WorkspaceCache`] document.
///
/// Writes go through a temporary file in the same directory followed by a
/// rename, so readers see either the old document or the new one, never a
/// partial write.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// A store for `CACHE_FILENAME` inside `cache_dir`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(CACHE_FILENAME),
        }
    }

    /// A store backed by an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cache document.
    ///
    /// A missing file yields an empty cache. An unparsable document or an
    /// unknown schema version is moved aside to a `.corrupt-<timestamp>`
    /// backup and replaced by an empty document.
    pub async fn load(&self) -> Result<WorkspaceCache> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache file, starting empty");
                return Ok(WorkspaceCache::default());
            }
            Err(e) => return Err(e.into()),
        };

        match self.parse_document(&contents) {
            Ok(cache) => Ok(cache),
            Err(err) => self.recover(err).await,
        }
    }

    /// Atomically writes `cache` to disk.
    pub async fn save(&self, cache: &WorkspaceCache) -> Result<()> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ensure_private_dir(&dir).await?;

        let json = serde_json::to_vec_pretty(cache)?;
        write_atomic(&self.path, &json).await?;
        debug!(path = %self.path.display(), entries = cache.entries.len(), "cache saved");
        Ok(())
    }

    /// Inserts or replaces a single entry without touching `last_sync`.
    pub async fn upsert(&self, entry: CacheEntry) -> Result<WorkspaceCache> {
        let mut cache = self.load().await?;
        cache.upsert(entry);
        self.save(&cache).await?;
        Ok(cache)
    }

    /// Resets the cache to an empty document.
    pub async fn clear(&self) -> Result<()> {
        self.save(&WorkspaceCache::default()).await
    }

    /// Entry count, age, and on-disk size.
    pub async fn stats(&self) -> Result<CacheStats> {
        let cache = self.load().await?;
        let size_bytes = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(CacheStats {
            count: cache.entries.len(),
            age_ms: cache.age_ms(),
            size_bytes,
            last_sync: cache.last_sync,
            sync_errors: cache.sync_errors.len(),
        })
    }

    fn parse_document(&self, contents: &[u8]) -> Result<WorkspaceCache> {
        let corrupted = |message: String| ResolverError::CacheCorrupted {
            path: self.path.display().to_string(),
            message,
        };

        let raw: serde_json::Value =
            serde_json::from_slice(contents).map_err(|e| corrupted(format!("invalid JSON: {e}")))?;
        match raw.get("version").and_then(|v| v.as_str()) {
            Some(CACHE_VERSION) => {}
            Some(other) => return Err(corrupted(format!("unsupported schema version '{other}'"))),
            None => return Err(corrupted("missing schema version".to_string())),
        }

        let mut cache: WorkspaceCache =
            serde_json::from_value(raw).map_err(|e| corrupted(format!("invalid document: {e}")))?;

        let mut seen = HashSet::new();
        let before = cache.entries.len();
        cache.entries.retain(|e| seen.insert(e.id.clone()));
        if cache.entries.len() != before {
            warn!(
                path = %self.path.display(),
                dropped = before - cache.entries.len(),
                "dropped duplicate cache entries"
            );
        }
        Ok(cache)
    }

    async fn recover(&self, err: ResolverError) -> Result<WorkspaceCache> {
        let backup = self.backup_path();
        warn!(error = %err, backup = %backup.display(), "cache corrupted, resetting");

        if let Err(e) = tokio::fs::rename(&self.path, &backup).await {
            warn!(error = %e, "failed to back up corrupted cache, leaving it in place");
            return Ok(WorkspaceCache::default());
        }

        let fresh = WorkspaceCache::default();
        self.save(&fresh).await?;
        Ok(fresh)
    }

    fn backup_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        self.path
            .with_file_name(format!("{}.corrupt-{}", file_name(&self.path), stamp))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| CACHE_FILENAME.to_string())
}
