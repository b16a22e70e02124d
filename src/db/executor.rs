//! Query execution engine.
//!
//! Statements are sent as raw SQL (no prepared statement), streamed, cut at the
//! row cap and bounded by a timeout. Rows are decoded to JSON through `RowToJson`.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{AgentError, AgentResult};
use crate::models::{MAX_ROW_LIMIT, QueryResult};
use futures_util::StreamExt;
use sqlx::{Database, Executor, Pool};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
    row_limit: usize,
}

impl QueryExecutor {
    pub fn new(query_timeout: Duration) -> Self {
        Self {
            query_timeout,
            row_limit: MAX_ROW_LIMIT,
        }
    }

    /// Lower the row cap. Never raised above `MAX_ROW_LIMIT`.
    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit.clamp(1, MAX_ROW_LIMIT);
        self
    }

    /// Execute a statement and decode its rows.
    pub async fn fetch(&self, pool: &DbPool, sql: &str) -> AgentResult<QueryResult> {
        debug!(
            sql = %sql,
            limit = self.row_limit,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        match pool {
            DbPool::MySql(p) => self.fetch_from(p, sql).await,
            DbPool::Postgres(p) => self.fetch_from(p, sql).await,
            DbPool::SQLite(p) => self.fetch_from(p, sql).await,
        }
    }

    async fn fetch_from<DB>(&self, pool: &Pool<DB>, sql: &str) -> AgentResult<QueryResult>
    where
        DB: Database,
        DB::Row: RowToJson,
        for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
    {
        // One extra row tells us whether the cap cut the result
        let fetch_limit = self.row_limit + 1;
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();

        let results = timeout(self.query_timeout, rows_future)
            .await
            .map_err(|_| timeout_error(self.query_timeout))?;

        let mut rows = Vec::with_capacity(results.len());
        for result in results {
            rows.push(result.map_err(AgentError::from)?);
        }
        Ok(process_rows(rows, self.row_limit))
    }
}

fn process_rows<R: RowToJson>(rows: Vec<R>, row_limit: usize) -> QueryResult {
    let Some(first) = rows.first() else {
        return QueryResult::default();
    };

    let columns = first.column_metadata();
    let truncated = rows.len() > row_limit;
    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    QueryResult {
        columns,
        rows: rows.iter().take(row_limit).map(|r| r.to_json_row()).collect(),
        truncated,
    }
}

fn timeout_error(query_timeout: Duration) -> AgentError {
    AgentError::transient(
        format!("Query timed out after {}s", query_timeout.as_secs()),
        Some("ETIMEDOUT"),
    )
}
