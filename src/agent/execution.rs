//! Guarded statement execution with retry, caching, history and metrics.

use crate::agent::cache::QueryCache;
use crate::agent::history::{QueryHistory, QueryHistoryRecord};
use crate::agent::metrics::Metrics;
use crate::agent::retry::{RetryPolicy, retry};
use crate::config::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS, DEFAULT_HISTORY_SIZE,
    DEFAULT_RETRY_ATTEMPTS,
};
use crate::db::QueryBackend;
use crate::error::AgentError;
use crate::models::ExecutionOutcome;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Results with this many rows or more are never cached.
pub const MAX_CACHEABLE_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct ExecutionSettings {
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub history_size: usize,
    pub retry_attempts: u32,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            history_size: DEFAULT_HISTORY_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub metrics: Metrics,
    pub success_rate: f64,
    pub cache: CacheStatus,
    pub recent_history: Vec<QueryHistoryRecord>,
}

pub struct ExecutionLayer {
    backend: Arc<dyn QueryBackend>,
    cache: Mutex<QueryCache>,
    history: Mutex<QueryHistory>,
    metrics: Mutex<Metrics>,
    retry: RetryPolicy,
}

impl ExecutionLayer {
    pub fn new(backend: Arc<dyn QueryBackend>, settings: ExecutionSettings) -> Self {
        Self {
            backend,
            cache: Mutex::new(QueryCache::new(
                settings.cache_ttl,
                settings.cache_max_entries,
            )),
            history: Mutex::new(QueryHistory::new(settings.history_size)),
            metrics: Mutex::new(Metrics::default()),
            retry: RetryPolicy::new(settings.retry_attempts),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run an already guarded statement. Failures come back inside the outcome.
    pub async fn execute(&self, sql: &str, use_cache: bool) -> ExecutionOutcome {
        let start = Instant::now();

        if use_cache {
            let cached = self.cache.lock().await.get(sql);
            if let Some(rows) = cached {
                self.metrics.lock().await.record_cache_hit();
                debug!(rows = rows.len(), "Served from cache");
                return ExecutionOutcome::succeeded(sql, rows, elapsed_ms(start), true);
            }
        }

        debug!(sql = %sql, "Executing query");
        let backend = &self.backend;
        let seen_generation = backend.generation();
        let result = retry(
            self.retry,
            |attempt| async move {
                if attempt.is_final && attempt.number > 1 {
                    if let Err(e) = backend.reconnect(seen_generation).await {
                        warn!(error = %e, "Reconnect before final attempt failed");
                    }
                }
                backend.fetch_rows(sql).await
            },
            AgentError::is_retryable,
        )
        .await;
        let execution_time_ms = elapsed_ms(start);

        match result {
            Ok(result) => {
                let row_count = result.row_count();
                if use_cache && row_count > 0 && row_count < MAX_CACHEABLE_ROWS {
                    self.cache.lock().await.insert(sql, result.rows.clone());
                }
                self.metrics
                    .lock()
                    .await
                    .record_execution(true, execution_time_ms);
                self.history.lock().await.push(QueryHistoryRecord::new(
                    sql,
                    true,
                    execution_time_ms,
                    row_count,
                    None,
                ));
                info!(
                    rows = row_count,
                    truncated = result.truncated,
                    execution_time_ms,
                    "Query executed"
                );
                ExecutionOutcome::succeeded(sql, result.rows, execution_time_ms, false)
                    .with_truncated(result.truncated)
            }
            Err(e) => {
                error!(
                    error = %e,
                    kind = e.kind(),
                    code = ?e.code(),
                    execution_time_ms,
                    "Query failed"
                );
                self.metrics
                    .lock()
                    .await
                    .record_execution(false, execution_time_ms);
                self.history.lock().await.push(QueryHistoryRecord::new(
                    sql,
                    false,
                    execution_time_ms,
                    0,
                    Some(e.user_message()),
                ));
                ExecutionOutcome::failed(sql, &e, execution_time_ms)
            }
        }
    }

    pub async fn clear_cache(&self) -> usize {
        let cleared = self.cache.lock().await.clear();
        info!(cleared, "Query cache cleared");
        cleared
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn metrics(&self) -> Metrics {
        self.metrics.lock().await.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }

    pub async fn analytics(&self, recent: usize) -> AnalyticsSnapshot {
        let metrics = self.metrics().await;
        let cache = {
            let cache = self.cache.lock().await;
            CacheStatus {
                size: cache.len(),
                max_size: cache.max_entries(),
                ttl_seconds: cache.ttl().as_secs(),
            }
        };
        let recent_history = self.history.lock().await.recent(recent);
        AnalyticsSnapshot {
            success_rate: metrics.success_rate(),
            metrics,
            cache,
            recent_history,
        }
    }

    pub async fn ping(&self) -> bool {
        self.backend.ping().await
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
