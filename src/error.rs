//! Error types for the SQL agent server.
//!
//! Every failure in the pipeline is one of five kinds. The kind decides whether the
//! operation is retried, which friendly message the caller sees, and which HTTP status
//! the route layer answers with. The original driver message and code are always kept
//! as payload for diagnostics.

use serde::Serialize;
use thiserror::Error;

/// Which schema object an engine error complained about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaObject {
    Table,
    Column,
}

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    /// Connection reset, broken pipe, lost protocol, timeouts. Retried with backoff.
    #[error("Transient database error: {message}")]
    Transient {
        message: String,
        code: Option<String>,
    },

    /// Guard rejection or missing input. Never retried.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Unknown table or column reported by the database engine.
    #[error("Schema error: {message}")]
    SemanticSchema {
        message: String,
        /// e.g., "42S02" for an unknown MySQL table
        code: Option<String>,
        object: SchemaObject,
    },

    /// The text-generation model refused the call because of rate limiting.
    #[error("Model rate limit: {message}")]
    UpstreamRateLimit { message: String },

    #[error("{message}")]
    Unknown {
        message: String,
        code: Option<String>,
    },
}

impl AgentError {
    /// Create a transient error with an optional driver code.
    pub fn transient(message: impl Into<String>, code: Option<&str>) -> Self {
        Self::Transient {
            message: message.into(),
            code: code.map(String::from),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a schema error for an unknown table or column.
    pub fn semantic_schema(
        message: impl Into<String>,
        code: Option<String>,
        object: SchemaObject,
    ) -> Self {
        Self::SemanticSchema {
            message: message.into(),
            code,
            object,
        }
    }

    /// Create an upstream rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::UpstreamRateLimit {
            message: message.into(),
        }
    }

    /// Create an unclassified error.
    pub fn unknown(message: impl Into<String>, code: Option<&str>) -> Self {
        Self::Unknown {
            message: message.into(),
            code: code.map(String::from),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Validation { .. } => "validation",
            Self::SemanticSchema { .. } => "semantic_schema",
            Self::UpstreamRateLimit { .. } => "upstream_rate_limit",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// The underlying driver or upstream code, when one was reported.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Transient { code, .. }
            | Self::SemanticSchema { code, .. }
            | Self::Unknown { code, .. } => code.as_deref(),
            Self::UpstreamRateLimit { .. } => Some("429"),
            Self::Validation { .. } => None,
        }
    }

    /// The raw message without the kind prefix.
    pub fn raw_message(&self) -> &str {
        match self {
            Self::Transient { message, .. }
            | Self::Validation { message }
            | Self::SemanticSchema { message, .. }
            | Self::UpstreamRateLimit { message }
            | Self::Unknown { message, .. } => message,
        }
    }

    /// Message suitable for end users.
    pub fn user_message(&self) -> String {
        match self {
            Self::SemanticSchema {
                object: SchemaObject::Table,
                ..
            } => "The requested table does not exist in the database.".to_string(),
            Self::SemanticSchema {
                object: SchemaObject::Column,
                ..
            } => "One or more requested columns do not exist in the table.".to_string(),
            Self::Transient { .. } => {
                "Database connection timed out. Please try again in a moment.".to_string()
            }
            Self::Validation { message } => message.clone(),
            Self::UpstreamRateLimit { .. } => {
                "The language model is currently rate limited. Please try again shortly."
                    .to_string()
            }
            Self::Unknown { message, .. } => format!("Query execution failed: {}", message),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Map an I/O error kind onto the codes callers know from the database drivers.
fn io_code(kind: std::io::ErrorKind) -> Option<&'static str> {
    use std::io::ErrorKind;
    match kind {
        ErrorKind::ConnectionReset => Some("ECONNRESET"),
        ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        ErrorKind::BrokenPipe => Some("EPIPE"),
        ErrorKind::TimedOut => Some("ETIMEDOUT"),
        ErrorKind::UnexpectedEof => Some("PROTOCOL_CONNECTION_LOST"),
        ErrorKind::NotConnected => Some("ENOTCONN"),
        _ => None,
    }
}

/// Classify a database engine error by SQLSTATE first, then by message.
fn classify_database_error(message: &str, code: Option<String>) -> AgentError {
    let lower = message.to_lowercase();
    let table_codes = ["42S02", "42P01"];
    let column_codes = ["42S22", "42703"];

    let by_code = code.as_deref().and_then(|c| {
        if table_codes.contains(&c) {
            Some(SchemaObject::Table)
        } else if column_codes.contains(&c) {
            Some(SchemaObject::Column)
        } else {
            None
        }
    });

    let object = by_code.or_else(|| {
        if lower.contains("no such table") || (lower.contains("table") && lower.contains("doesn't exist")) {
            Some(SchemaObject::Table)
        } else if lower.contains("no such column") || lower.contains("unknown column") {
            Some(SchemaObject::Column)
        } else {
            None
        }
    });

    match object {
        Some(object) => AgentError::semantic_schema(message, code, object),
        None => AgentError::Unknown {
            message: message.to_string(),
            code,
        },
    }
}

/// Convert sqlx errors to AgentError.
impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                classify_database_error(db_err.message(), code)
            }
            sqlx::Error::Io(io_err) => match io_code(io_err.kind()) {
                Some(code) => AgentError::transient(format!("I/O error: {}", io_err), Some(code)),
                None => AgentError::unknown(format!("I/O error: {}", io_err), None),
            },
            sqlx::Error::Protocol(msg) => AgentError::transient(
                format!("Protocol error: {}", msg),
                Some("PROTOCOL_CONNECTION_LOST"),
            ),
            sqlx::Error::PoolTimedOut => {
                AgentError::transient("Timed out acquiring a pooled connection", Some("ETIMEDOUT"))
            }
            sqlx::Error::PoolClosed => {
                AgentError::transient("Connection pool is closed", Some("POOL_CLOSED"))
            }
            sqlx::Error::WorkerCrashed => {
                AgentError::transient("Database worker crashed", Some("WORKER_CRASHED"))
            }
            sqlx::Error::ColumnNotFound(col) => AgentError::semantic_schema(
                format!("Column not found: {}", col),
                None,
                SchemaObject::Column,
            ),
            sqlx::Error::Configuration(msg) => {
                AgentError::unknown(format!("Configuration error: {}", msg), Some("CONFIG"))
            }
            sqlx::Error::Tls(tls_err) => {
                AgentError::unknown(format!("TLS error: {}", tls_err), Some("TLS"))
            }
            sqlx::Error::RowNotFound => AgentError::unknown("No rows returned", None),
            sqlx::Error::ColumnDecode { index, source } => {
                AgentError::unknown(format!("Failed to decode column {}: {}", index, source), None)
            }
            sqlx::Error::Decode(source) => {
                AgentError::unknown(format!("Decode error: {}", source), None)
            }
            _ => AgentError::unknown(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for pipeline operations.
pub type AgentResult<T> = Result<T, AgentError>;
