//! HTTP surface of the agent.

pub mod auth;
pub mod routes;
pub mod server;

pub use auth::{AdminAuth, require_admin};
pub use routes::router;
pub use server::serve;

use crate::agent::AgentContext;
use crate::error::AgentError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentContext>,
    pub auth: Arc<AdminAuth>,
}

impl AppState {
    pub fn new(agent: Arc<AgentContext>, auth: AdminAuth) -> Self {
        Self {
            agent,
            auth: Arc::new(auth),
        }
    }
}

/// Error body returned by every route.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

/// `AgentError` mapped onto an HTTP status.
#[derive(Debug)]
pub struct ApiError(pub AgentError);

/// HTTP status for an error kind name as reported by `AgentError::kind`.
pub fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "validation" | "semantic_schema" => StatusCode::BAD_REQUEST,
        "transient" | "upstream_rate_limit" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for_kind(self.0.kind())
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.0.user_message(),
            kind: self.0.kind(),
            code: self.0.code().map(String::from),
        };
        (status, Json(body)).into_response()
    }
}
