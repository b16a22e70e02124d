//! Query-related data models.
//!
//! This module defines the rows returned by the database and the structured
//! outcome the execution layer hands back to callers.

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Hard cap on the rows fetched for a single statement.
pub const MAX_ROW_LIMIT: usize = 10_000;

/// One result row, column name to JSON value.
pub type JsonRow = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows produced by one statement against the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<JsonRow>,
    /// True when the row cap cut the result short
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Failure details attached to an unsuccessful outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFailure {
    /// Friendly message for end users
    pub message: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Raw driver message
    pub detail: String,
}

impl From<&AgentError> for QueryFailure {
    fn from(err: &AgentError) -> Self {
        Self {
            message: err.user_message(),
            kind: err.kind().to_string(),
            code: err.code().map(String::from),
            detail: err.raw_message().to_string(),
        }
    }
}

/// Structured result of running a guarded statement. Failures are values, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub success: bool,
    pub sql: String,
    pub rows: Vec<JsonRow>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub from_cache: bool,
    /// True when the executor's row cap cut the result short
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryFailure>,
}

impl ExecutionOutcome {
    pub fn succeeded(
        sql: impl Into<String>,
        rows: Vec<JsonRow>,
        execution_time_ms: u64,
        from_cache: bool,
    ) -> Self {
        Self {
            success: true,
            sql: sql.into(),
            row_count: rows.len(),
            rows,
            execution_time_ms,
            from_cache,
            truncated: false,
            error: None,
        }
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn failed(sql: impl Into<String>, err: &AgentError, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            sql: sql.into(),
            rows: Vec::new(),
            row_count: 0,
            execution_time_ms,
            from_cache: false,
            truncated: false,
            error: Some(QueryFailure::from(err)),
        }
    }

    /// The user-facing error message, if the outcome failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
