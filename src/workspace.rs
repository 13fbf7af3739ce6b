use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{CacheStore, SyncLock};
use crate::config::{load_config, ResolverConfig};
use crate::errors::Result;
use crate::remote::{DirectoryService, NotionDirectory, OfflineDirectory, Retrying};
use crate::resolution::{ResolveOptions, Resolver};
use crate::sync::SyncOrchestrator;
use crate::types::*;

/// Entry point tying together configuration, the cache store, the sync lock,
/// and the remote directory.
pub struct Workspace {
    config: ResolverConfig,
    store: CacheStore,
    lock: SyncLock,
    directory: Arc<dyn DirectoryService>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl Workspace {
    /// Creates a workspace over an already configured directory service.
    ///
    /// No retry policy is applied; see [`Workspace::with_retry`].
    pub fn new(config: ResolverConfig, directory: Arc<dyn DirectoryService>) -> Self {
        let store = CacheStore::new(&config.cache_dir);
        let lock = SyncLock::new(
            &config.cache_dir,
            Duration::from_millis(config.lock_stale_ms),
        );
        Self {
            config,
            store,
            lock,
            directory,
        }
    }

    /// Creates a workspace whose directory calls go through the configured
    /// retry policy.
    pub fn with_retry<D: DirectoryService + 'static>(config: ResolverConfig, directory: D) -> Self {
        let retrying = Retrying::new(directory, config.retry.clone());
        Self::new(config, Arc::new(retrying))
    }

    /// Loads configuration and connects to the Notion API.
    ///
    /// Without a `NOTION_TOKEN` the workspace runs offline: cached lookups
    /// still work, syncs and remote searches fail.
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        Ok(match NotionDirectory::from_env() {
            Ok(directory) => Self::with_retry(config, directory),
            Err(e) => {
                warn!(error = %e, "running without remote directory");
                Self::new(config, Arc::new(OfflineDirectory))
            }
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn lock(&self) -> &SyncLock {
        &self.lock
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.config, &self.store, &self.lock, self.directory.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl Workspace {
    /// Resolves `input` with options taken from the configuration.
    pub async fn resolve(&self, input: &str, kind: ObjectKind) -> Result<Resolved> {
        let options = ResolveOptions::from_config(&self.config);
        self.resolver().resolve(input, kind, &options).await
    }

    pub async fn resolve_with(
        &self,
        input: &str,
        kind: ObjectKind,
        options: &ResolveOptions,
    ) -> Result<Resolved> {
        self.resolver().resolve(input, kind, options).await
    }

    /// Resolves `input` and returns only the canonical ID.
    pub async fn resolve_id(&self, input: &str, kind: ObjectKind) -> Result<String> {
        self.resolve(input, kind).await.map(|r| r.id)
    }
}

// ---------------------------------------------------------------------------
// Cache maintenance
// ---------------------------------------------------------------------------

impl Workspace {
    /// Refreshes the cache from the remote directory.
    ///
    /// Without `force`, a cache younger than the TTL is left alone. `force`
    /// skips the TTL check but still respects another process's lock.
    pub async fn sync(&self, force: bool) -> Result<SyncOutcome> {
        if !force {
            let cache = self.store.load().await?;
            if !cache.is_stale(self.config.cache_ttl_ms) {
                info!(age_ms = ?cache.age_ms(), "cache is fresh, skipping sync");
                return Ok(SyncOutcome::Skipped(SkipReason::Fresh));
            }
        }
        SyncOrchestrator::new(
            &self.store,
            &self.lock,
            self.directory.as_ref(),
            self.config.sync_concurrency,
        )
        .run()
        .await
    }

    /// Cached entries matching `filter`, in cache order.
    pub async fn list_cached(&self, filter: &CacheFilter) -> Result<Vec<CacheEntry>> {
        let cache = self.store.load().await?;
        Ok(cache
            .entries
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }

    /// Resets the cache to an empty document.
    pub async fn clear_cache(&self) -> Result<()> {
        self.store.clear().await?;
        info!(path = %self.store.path().display(), "cache cleared");
        Ok(())
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.store.stats().await
    }

    /// Records an object the caller just created remotely, so it resolves
    /// without waiting for the next full sync.
    pub async fn record_created(&self, entry: CacheEntry) -> Result<()> {
        self.store.upsert(entry).await?;
        Ok(())
    }
}
