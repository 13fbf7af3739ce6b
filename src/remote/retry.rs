use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DirectoryService, ObjectDetail, RemoteResult, SearchHit, SummaryPage};
use crate::types::ObjectKind;

/// Exponential backoff policy for retryable remote failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based), capped at `max_backoff_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.saturating_sub(1) as i32);
        let ms = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out. A rate limit with a `retry_after_ms` hint waits
    /// for the hinted time instead of the computed backoff, capped at
    /// `max_backoff_ms`.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> RemoteResult<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = RemoteResult<T>> + Send,
        T: Send,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = match &err {
                        super::RemoteError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => Duration::from_millis((*ms).min(self.max_backoff_ms)),
                        _ => self.backoff(attempt),
                    };
                    debug!(
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying remote call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(operation = label, attempts = attempt, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Directory decorator that applies a [`RetryPolicy`] to every call.
pub struct Retrying<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D: DirectoryService> Retrying<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<D: DirectoryService> DirectoryService for Retrying<D> {
    async fn list_summaries(&self, cursor: Option<&str>) -> RemoteResult<SummaryPage> {
        self.policy
            .run("list_summaries", || self.inner.list_summaries(cursor))
            .await
    }

    async fn get_detail(&self, id: &str, kind: ObjectKind) -> RemoteResult<ObjectDetail> {
        self.policy
            .run("get_detail", || self.inner.get_detail(id, kind))
            .await
    }

    async fn search(&self, query: &str, kind: ObjectKind) -> RemoteResult<Vec<SearchHit>> {
        self.policy
            .run("search", || self.inner.search(query, kind))
            .await
    }
}
