//! Full refresh of the workspace cache from the remote directory.
//!
//! A sync moves through `Locking -> Fetching -> Detailing -> Persisting`.
//! Item-level failures do not abort the run: whatever was gathered is still
//! persisted and the failures are recorded in the cache's `syncErrors`. Only
//! a listing failure before anything was gathered aborts, leaving the
//! previous cache untouched.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, SyncLock};
use crate::errors::Result;
use crate::remote::{DirectoryService, ObjectDetail, ObjectSummary};
use crate::types::{CacheEntry, SkipReason, SyncOutcome, SyncStats};

/// Phases of a sync run, reported through tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Locking,
    Fetching,
    Detailing,
    Persisting,
    Idle,
}

/// Runs full syncs of the workspace cache.
pub struct SyncOrchestrator<'a> {
    store: &'a CacheStore,
    lock: &'a SyncLock,
    directory: &'a dyn DirectoryService,
    concurrency: usize,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        store: &'a CacheStore,
        lock: &'a SyncLock,
        directory: &'a dyn DirectoryService,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            lock,
            directory,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs one sync.
    ///
    /// Returns `Skipped(LockHeld)` without touching anything if another
    /// process holds a fresh lock. The lock is released on every exit path.
    pub async fn run(&self) -> Result<SyncOutcome> {
        enter(SyncPhase::Locking);
        let Some(guard) = self.lock.try_guard().await? else {
            info!("sync already in progress elsewhere, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::LockHeld));
        };

        let result = self.run_locked().await;

        if let Err(e) = guard.release().await {
            warn!(error = %e, "failed to release sync lock");
        }
        enter(SyncPhase::Idle);
        result.map(SyncOutcome::Completed)
    }

    async fn run_locked(&self) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();
        let mut failures = Vec::new();

        enter(SyncPhase::Fetching);
        let summaries = self.fetch_summaries(&mut stats, &mut failures).await?;
        stats.listed = summaries.len();

        enter(SyncPhase::Detailing);
        let entries = self.fetch_entries(&summaries, &mut stats, &mut failures).await;

        enter(SyncPhase::Persisting);
        let mut cache = self.store.load().await?;
        if entries.is_empty() && !summaries.is_empty() {
            warn!(
                listed = summaries.len(),
                "every detail request failed, keeping previous entries"
            );
        } else {
            stats.cached = entries.len();
            cache.entries = entries;
            cache.last_sync = Some(Utc::now());
        }
        for failure in failures {
            cache.record_sync_error(failure);
        }
        self.store.save(&cache).await?;

        stats.duration_ms = start.elapsed().as_millis() as u64;

        if stats.is_partial() {
            warn!(
                cached = stats.cached,
                failed = stats.failed,
                listing_truncated = stats.listing_truncated,
                "sync completed with failures"
            );
        } else {
            info!(
                cached = stats.cached,
                pages = stats.pages,
                duration_ms = stats.duration_ms,
                "sync completed"
            );
        }
        Ok(stats)
    }

    /// Pages through the listing until no cursor is returned.
    async fn fetch_summaries(
        &self,
        stats: &mut SyncStats,
        failures: &mut Vec<String>,
    ) -> Result<Vec<ObjectSummary>> {
        let mut summaries = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = match self.directory.list_summaries(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) if summaries.is_empty() => {
                    warn!(error = %e, "listing failed before any results, aborting sync");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(error = %e, gathered = summaries.len(), "listing failed, continuing with partial results");
                    failures.push(format!("listing stopped after {} pages: {}", stats.pages, e));
                    stats.listing_truncated = true;
                    break;
                }
            };
            stats.pages += 1;
            debug!(page = stats.pages, count = page.summaries.len(), "fetched listing page");

            for summary in page.summaries {
                if seen.insert(summary.id.clone()) {
                    summaries.push(summary);
                }
            }

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    warn!(cursor = %next, "listing returned the same cursor twice, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(summaries)
    }

    /// Fetches detail for every summary with at most `concurrency` requests
    /// in flight, preserving listing order.
    async fn fetch_entries(
        &self,
        summaries: &[ObjectSummary],
        stats: &mut SyncStats,
        failures: &mut Vec<String>,
    ) -> Vec<CacheEntry> {
        let directory = self.directory;
        let results: Vec<_> = stream::iter(summaries)
            .map(|summary| async move {
                let detail = directory.get_detail(&summary.id, summary.kind).await;
                (summary, detail)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(results.len());
        for (summary, detail) in results {
            match detail {
                Ok(detail) => {
                    let entry = entry_from_detail(detail);
                    if seen.insert(entry.id.clone()) {
                        entries.push(entry);
                    }
                }
                Err(e) => {
                    warn!(id = %summary.id, title = %summary.title, error = %e, "detail fetch failed");
                    stats.failed += 1;
                    failures.push(format!("{} ({}): {}", summary.title, summary.id, e));
                }
            }
        }
        entries
    }
}

/// Builds a cache entry from a detail response.
pub fn entry_from_detail(detail: ObjectDetail) -> CacheEntry {
    let mut entry = CacheEntry::new(detail.id, detail.kind, detail.title);
    entry.url = detail.url;
    entry.last_edited_time = detail.last_edited_time;
    entry.archived = detail.archived;
    entry.property_summary = detail.properties;
    entry
}

fn enter(phase: SyncPhase) {
    debug!(phase = ?phase, "sync phase");
}
