/// On-disk workspace cache and the advisory sync lock that guards refreshes.
///
/// Both live in the same per-user cache directory, which is created with
/// owner-only permissions on first write.
mod lock;
mod store;

pub use lock::{SyncLock, SyncLockGuard, LOCK_FILENAME};
pub use store::{CacheStore, CACHE_FILENAME};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::errors::Result;

/// Creates `dir` (and parents) with mode 0700 on unix.
pub(crate) async fn ensure_private_dir(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await?;
    Ok(())
}

/// Writes `bytes` to `target` through a temporary sibling file, fsync and
/// rename. The temporary file is removed if any step fails.
pub(crate) async fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = tmp_path(target);
    if let Err(e) = write_and_rename(&tmp_path, target, bytes).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temporary file");
            }
        }
        return Err(e);
    }
    Ok(())
}

fn tmp_path(target: &Path) -> PathBuf {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), nanos))
}

async fn write_and_rename(tmp_path: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp_path, target).await
}
