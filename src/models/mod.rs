//! Data models for the SQL agent server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{
    ColumnMetadata, ExecutionOutcome, JsonRow, MAX_ROW_LIMIT, QueryFailure, QueryResult,
};
pub use schema::{ColumnInfo, ForeignRef, KeyRole, TableSchema};
