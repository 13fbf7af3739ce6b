#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use workspace_resolver::cache::{CacheStore, SyncLock};
use workspace_resolver::config::ResolverConfig;
use workspace_resolver::remote::{
    DirectoryService, ObjectDetail, ObjectSummary, RemoteError, RemoteResult, SearchHit,
    SummaryPage,
};
use workspace_resolver::types::{CacheEntry, ObjectKind, WorkspaceCache};

/// Deterministic 32-hex ID for test objects.
pub fn hex_id(n: u32) -> String {
    format!("{:032x}", n)
}

/// In-memory directory service with call counters.
#[derive(Default)]
pub struct MockDirectory {
    pages: Vec<Vec<ObjectSummary>>,
    details: HashMap<String, ObjectDetail>,
    detail_errors: HashMap<String, RemoteError>,
    search_hits: Vec<SearchHit>,
    search_error: Option<RemoteError>,
    fail_listing_at: Option<usize>,
    detail_delay: Duration,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub searched: Mutex<Vec<String>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listing page of databases with the given `(id, title)` pairs.
    pub fn with_page<S: AsRef<str>>(mut self, objects: &[(S, &str)]) -> Self {
        let mut page = Vec::new();
        for (id, title) in objects {
            let id = id.as_ref();
            page.push(ObjectSummary {
                id: id.to_string(),
                kind: ObjectKind::Database,
                title: title.to_string(),
            });
            self.details
                .insert(id.to_string(), detail(id, ObjectKind::Database, title));
        }
        self.pages.push(page);
        self
    }

    /// Adds a listing page with no results.
    pub fn with_empty_page(mut self) -> Self {
        self.pages.push(Vec::new());
        self
    }

    pub fn with_detail_error(mut self, id: &str, err: RemoteError) -> Self {
        self.detail_errors.insert(id.to_string(), err);
        self
    }

    pub fn with_archived(mut self, id: &str) -> Self {
        if let Some(d) = self.details.get_mut(id) {
            d.archived = true;
        }
        self
    }

    pub fn with_search_hit(mut self, id: &str, kind: ObjectKind, title: &str) -> Self {
        self.search_hits.push(SearchHit {
            id: id.to_string(),
            kind,
            title: title.to_string(),
        });
        self
    }

    pub fn with_search_error(mut self, err: RemoteError) -> Self {
        self.search_error = Some(err);
        self
    }

    /// Makes the listing call for page `index` (0-based) fail.
    pub fn failing_listing_at(mut self, index: usize) -> Self {
        self.fail_listing_at = Some(index);
        self
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn list_summaries(&self, cursor: Option<&str>) -> RemoteResult<SummaryPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let index: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        if self.fail_listing_at == Some(index) {
            return Err(RemoteError::Transient("listing unavailable".to_string()));
        }
        let summaries = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if index + 1 < self.pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };
        Ok(SummaryPage {
            summaries,
            next_cursor,
        })
    }

    async fn get_detail(&self, id: &str, _kind: ObjectKind) -> RemoteResult<ObjectDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.detail_delay.is_zero() {
            tokio::time::sleep(self.detail_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.detail_errors.get(id) {
            return Err(err.clone());
        }
        self.details
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn search(&self, query: &str, kind: ObjectKind) -> RemoteResult<Vec<SearchHit>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.searched.lock().unwrap().push(query.to_string());
        if let Some(err) = &self.search_error {
            return Err(err.clone());
        }
        Ok(self
            .search_hits
            .iter()
            .filter(|h| h.kind == kind)
            .cloned()
            .collect())
    }
}

pub fn detail(id: &str, kind: ObjectKind, title: &str) -> ObjectDetail {
    ObjectDetail {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        url: Some(format!("https://www.notion.so/{id}")),
        last_edited_time: None,
        archived: false,
        properties: BTreeMap::from([("Name".to_string(), "title".to_string())]),
    }
}

/// Config rooted in a fresh temp dir, with sync disabled and no retries.
pub fn test_config(dir: &TempDir) -> ResolverConfig {
    let mut config = ResolverConfig::with_cache_dir(dir.path());
    config.auto_sync = false;
    config.retry = workspace_resolver::remote::RetryPolicy::none();
    config
}

pub fn store_and_lock(config: &ResolverConfig) -> (CacheStore, SyncLock) {
    (
        CacheStore::new(&config.cache_dir),
        SyncLock::new(
            &config.cache_dir,
            Duration::from_millis(config.lock_stale_ms),
        ),
    )
}

/// Writes a synced cache containing `entries` to `store`.
pub async fn seed_cache(store: &CacheStore, entries: Vec<CacheEntry>) {
    let cache = WorkspaceCache {
        last_sync: Some(chrono::Utc::now()),
        entries,
        ..WorkspaceCache::default()
    };
    store.save(&cache).await.expect("failed to seed cache");
}
