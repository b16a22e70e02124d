//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management with rebuild on connection loss
//! - Query execution
//! - Schema catalog loading
//! - Row decoding to JSON

pub mod executor;
pub mod pool;
pub mod schema;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionManager, DbPool};
pub use schema::SchemaInspector;

use crate::error::AgentResult;
use crate::models::QueryResult;
use async_trait::async_trait;

/// The database operations the execution layer depends on.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Run one statement and return its rows.
    async fn fetch_rows(&self, sql: &str) -> AgentResult<QueryResult>;

    /// Counter bumped by every successful reconnect.
    fn generation(&self) -> u64;

    /// Tear down and recreate the underlying connections, unless another
    /// caller already did so after `seen` was read from [`generation`].
    ///
    /// [`generation`]: QueryBackend::generation
    async fn reconnect(&self, seen: u64) -> AgentResult<()>;

    /// Whether a connection can currently be acquired.
    async fn ping(&self) -> bool;
}
