use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::ensure_private_dir;
use crate::errors::Result;

/// Name of the lock file inside the cache directory.
pub const LOCK_FILENAME: &str = "sync.lock";

/// How far ahead of the local clock a lock token may be before it is distrusted.
const CLOCK_SKEW_MS: i64 = 60_000;

/// Advisory, file-existence based lock that keeps processes from running
/// redundant syncs.
///
/// This is best effort: two processes can still race between reading a
/// stale lock and recreating it. The cost of losing that race is one extra
/// sync; the cache file itself is protected by atomic rename.
#[derive(Debug, Clone)]
pub struct SyncLock {
    path: PathBuf,
    stale_after: Duration,
}

impl SyncLock {
    pub fn new(cache_dir: &Path, stale_after: Duration) -> Self {
        Self {
            path: cache_dir.join(LOCK_FILENAME),
            stale_after,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tries to create the lock file.
    ///
    /// Returns `false` if another holder's lock is younger than the
    /// staleness threshold. A stale lock is removed and acquisition is
    /// retried once.
    pub async fn acquire(&self) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent).await?;
        }

        if self.try_create().await? {
            return Ok(true);
        }

        match self.age().await? {
            Some(age) if age <= self.stale_after => {
                debug!(path = %self.path.display(), age_ms = age.as_millis() as u64, "sync lock held");
                Ok(false)
            }
            // released between our attempt and the read
            None => self.try_create().await,
            Some(age) => {
                warn!(
                    path = %self.path.display(),
                    age_ms = age.as_millis() as u64,
                    "removing stale sync lock"
                );
                remove_if_exists(&self.path).await?;
                self.try_create().await
            }
        }
    }

    /// Acquires the lock and wraps it in a guard that releases on drop.
    pub async fn try_guard(&self) -> Result<Option<SyncLockGuard>> {
        if self.acquire().await? {
            Ok(Some(SyncLockGuard {
                path: self.path.clone(),
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    /// Deletes the lock file. A missing file is not an error.
    pub async fn release(&self) -> Result<()> {
        remove_if_exists(&self.path).await
    }

    /// True if a lock file exists and is not stale.
    pub async fn is_held(&self) -> Result<bool> {
        Ok(matches!(self.age().await?, Some(age) if age <= self.stale_after))
    }

    async fn try_create(&self) -> Result<bool> {
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;
        match opened {
            Ok(mut file) => {
                let token = Utc::now().timestamp_millis().to_string();
                file.write_all(token.as_bytes()).await?;
                file.flush().await?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Age of the current lock, or `None` if there is no lock or its
    /// timestamp cannot be read.
    ///
    /// An unreadable token falls back to the file's modification time so a
    /// lock caught mid-write is not mistaken for an abandoned one. So does a
    /// token further in the future than [`CLOCK_SKEW_MS`].
    async fn age(&self) -> Result<Option<Duration>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let now_ms = Utc::now().timestamp_millis();
        match contents.trim().parse::<i64>() {
            Ok(created_ms) if created_ms <= now_ms.saturating_add(CLOCK_SKEW_MS) => {
                return Ok(Some(Duration::from_millis(
                    now_ms.saturating_sub(created_ms).max(0) as u64,
                )));
            }
            Ok(created_ms) => {
                debug!(path = %self.path.display(), created_ms, now_ms, "lock token is in the future, using mtime");
            }
            Err(_) => {}
        }

        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .ok();
        Ok(modified.map(|m| m.elapsed().unwrap_or_default()))
    }
}

/// Held sync lock; the lock file is removed when the guard is released or
/// dropped.
#[derive(Debug)]
pub struct SyncLockGuard {
    path: PathBuf,
    released: bool,
}

impl SyncLockGuard {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        remove_if_exists(&self.path).await
    }
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release sync lock");
            }
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
