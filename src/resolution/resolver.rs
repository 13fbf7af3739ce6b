use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::cache::{CacheStore, SyncLock};
use crate::config::ResolverConfig;
use crate::errors::{ResolverError, Result};
use crate::fuzzy;
use crate::identifier::{normalize_id, IdentifierParser, ParsedIdentifier};
use crate::remote::DirectoryService;
use crate::sync::SyncOrchestrator;
use crate::types::*;

/// Minimum fuzzy score for a title to be offered as a suggestion on a miss.
pub const SUGGESTION_FLOOR: f64 = 0.4;

/// Maximum number of suggestions attached to a not-found error.
const MAX_SUGGESTIONS: usize = 3;

/// Per-call resolution options.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Also match archived entries.
    pub include_archived: bool,
    /// Allow a sync when the cache is stale or misses.
    pub auto_sync: bool,
    pub fuzzy_threshold: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl ResolveOptions {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            include_archived: false,
            auto_sync: config.auto_sync,
            fuzzy_threshold: config.fuzzy_threshold,
        }
    }
}

/// Resolves human-supplied identifiers into canonical IDs.
///
/// Stages are tried in order and the first hit wins:
/// 1. **Identifier** -- URL or bare ID, no I/O.
/// 2. **Exact title** -- normalized title equality.
/// 3. **Alias** -- membership in an entry's alias set.
/// 4. **Fuzzy** -- best normalized edit-distance score above the threshold.
/// 5. **Sync** -- with auto-sync on, refresh the cache once and retry 2-4.
/// 6. **Remote search** -- first remote result of the requested kind.
pub struct Resolver<'a> {
    config: &'a ResolverConfig,
    parser: IdentifierParser,
    store: &'a CacheStore,
    lock: &'a SyncLock,
    directory: &'a dyn DirectoryService,
}

impl<'a> Resolver<'a> {
    pub fn new(
        config: &'a ResolverConfig,
        store: &'a CacheStore,
        lock: &'a SyncLock,
        directory: &'a dyn DirectoryService,
    ) -> Self {
        Self {
            config,
            parser: IdentifierParser::new(config.host_markers.clone()),
            store,
            lock,
            directory,
        }
    }

    /// Resolves `input` to an object of `kind`.
    pub async fn resolve(
        &self,
        input: &str,
        kind: ObjectKind,
        options: &ResolveOptions,
    ) -> Result<Resolved> {
        let mut attempted = vec![ResolutionStage::Identifier];

        let query = match self.parser.parse(input)? {
            ParsedIdentifier::Url(id) | ParsedIdentifier::Id(id) => {
                debug!(%id, "resolved from identifier");
                return Ok(Resolved {
                    id,
                    stage: ResolutionStage::Identifier,
                    title: None,
                });
            }
            ParsedIdentifier::Name(name) => name,
        };

        let mut cache = self.store.load().await?;
        let mut synced = false;

        if options.auto_sync && cache.is_stale(self.config.cache_ttl_ms) {
            debug!(age_ms = ?cache.age_ms(), "cache stale, syncing before lookup");
            attempted.push(ResolutionStage::Sync);
            cache = self.sync_for_lookup(cache).await;
            synced = true;
        }

        if let Some(found) = self.match_cached(&cache, &query, kind, options, &mut attempted)? {
            return Ok(found);
        }

        if options.auto_sync && !synced {
            debug!(%query, "cache miss, syncing");
            push_stage(&mut attempted, ResolutionStage::Sync);
            cache = self.sync_for_lookup(cache).await;
            let retry = ResolveOptions {
                auto_sync: false,
                ..options.clone()
            };
            if let Some(found) = self.match_cached(&cache, &query, kind, &retry, &mut attempted)? {
                return Ok(found);
            }
        }

        attempted.push(ResolutionStage::RemoteSearch);
        let mut remote_error = None;
        match self.directory.search(input.trim(), kind).await {
            Ok(hits) => {
                if let Some(hit) = hits.into_iter().find(|h| h.kind == kind) {
                    debug!(id = %hit.id, "resolved via remote search");
                    return Ok(Resolved {
                        id: normalize_id(&hit.id),
                        stage: ResolutionStage::RemoteSearch,
                        title: Some(hit.title),
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "remote search failed");
                remote_error = Some(e.to_string());
            }
        }

        Err(ResolverError::NotFound {
            input: input.trim().to_string(),
            kind,
            suggestions: suggestions(&cache, &query, kind, options),
            attempted,
            remote_error,
        })
    }

    /// Runs cache stages 2-4 against `cache`.
    fn match_cached(
        &self,
        cache: &WorkspaceCache,
        query: &str,
        kind: ObjectKind,
        options: &ResolveOptions,
        attempted: &mut Vec<ResolutionStage>,
    ) -> Result<Option<Resolved>> {
        let candidates: Vec<&CacheEntry> = candidates(cache, kind, options).collect();

        push_stage(attempted, ResolutionStage::ExactTitle);
        let exact: Vec<&CacheEntry> = candidates
            .iter()
            .copied()
            .filter(|e| e.title_normalized == query)
            .collect();
        if let Some(found) = pick_unique(&exact, query, kind, ResolutionStage::ExactTitle)? {
            return Ok(Some(found));
        }

        push_stage(attempted, ResolutionStage::Alias);
        let by_alias: Vec<&CacheEntry> = candidates
            .iter()
            .copied()
            .filter(|e| e.has_alias(query))
            .collect();
        if let Some(found) = pick_unique(&by_alias, query, kind, ResolutionStage::Alias)? {
            return Ok(Some(found));
        }

        push_stage(attempted, ResolutionStage::Fuzzy);
        Ok(best_fuzzy(&candidates, query, options.fuzzy_threshold).map(|(entry, score)| {
            debug!(id = %entry.id, score, "resolved by fuzzy match");
            Resolved {
                id: entry.id.clone(),
                stage: ResolutionStage::Fuzzy,
                title: Some(entry.title.clone()),
            }
        }))
    }

    /// Syncs once and reloads the cache. Any failure, remote or local, falls
    /// back to `stale`, so lookups continue on old data.
    async fn sync_for_lookup(&self, stale: WorkspaceCache) -> WorkspaceCache {
        let orchestrator = SyncOrchestrator::new(
            self.store,
            self.lock,
            self.directory,
            self.config.sync_concurrency,
        );
        let refreshed = match orchestrator.run().await {
            Ok(_) => self.store.load().await,
            Err(e) => Err(e),
        };
        match refreshed {
            Ok(cache) => cache,
            Err(e) => {
                warn!(
                    error = %e,
                    age_ms = ?stale.age_ms(),
                    "sync failed, resolving against possibly stale cache"
                );
                stale
            }
        }
    }
}

/// Maximum score of `query` against an entry's normalized title and aliases.
pub fn entry_score(entry: &CacheEntry, query: &str) -> f64 {
    std::iter::once(entry.title_normalized.as_str())
        .chain(entry.aliases.iter().map(String::as_str))
        .map(|candidate| fuzzy::score(query, candidate))
        .fold(0.0, f64::max)
}

/// Highest-scoring entry at or above `threshold`; equal scores go to the
/// lexicographically smallest ID.
fn best_fuzzy<'e>(
    candidates: &[&'e CacheEntry],
    query: &str,
    threshold: f64,
) -> Option<(&'e CacheEntry, f64)> {
    candidates
        .iter()
        .map(|e| (*e, entry_score(e, query)))
        .filter(|(_, score)| *score >= threshold)
        .min_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        })
}

fn candidates<'c>(
    cache: &'c WorkspaceCache,
    kind: ObjectKind,
    options: &'c ResolveOptions,
) -> impl Iterator<Item = &'c CacheEntry> + 'c {
    cache
        .entries
        .iter()
        .filter(move |e| e.kind == kind && (options.include_archived || !e.archived))
}

fn pick_unique(
    matches: &[&CacheEntry],
    query: &str,
    kind: ObjectKind,
    stage: ResolutionStage,
) -> Result<Option<Resolved>> {
    match matches {
        [] => Ok(None),
        [entry] => {
            debug!(id = %entry.id, stage = stage.as_str(), "resolved from cache");
            Ok(Some(Resolved {
                id: entry.id.clone(),
                stage,
                title: Some(entry.title.clone()),
            }))
        }
        many => Err(ResolverError::Ambiguous {
            input: query.to_string(),
            kind,
            candidates: many
                .iter()
                .map(|e| (e.id.clone(), e.title.clone()))
                .collect(),
        }),
    }
}

fn suggestions(
    cache: &WorkspaceCache,
    query: &str,
    kind: ObjectKind,
    options: &ResolveOptions,
) -> Vec<String> {
    let mut scored: Vec<(f64, &CacheEntry)> = candidates(cache, kind, options)
        .map(|e| (entry_score(e, query), e))
        .filter(|(score, _)| *score >= SUGGESTION_FLOOR)
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, e)| e.title.clone())
        .collect()
}

fn push_stage(attempted: &mut Vec<ResolutionStage>, stage: ResolutionStage) {
    if !attempted.contains(&stage) {
        attempted.push(stage);
    }
}
