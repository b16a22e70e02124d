//! Route handlers and request/response shapes.

use crate::agent::QueryHistoryRecord;
use crate::agent::categories::CategoryDefinition;
use crate::agent::catalog::TableSummary;
use crate::agent::execution::CacheStatus;
use crate::agent::metrics::Metrics;
use crate::http::auth::require_admin;
use crate::http::{ApiError, AppState, status_for_kind};
use crate::models::{JsonRow, QueryFailure};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// History records returned by `/analytics`.
const ANALYTICS_HISTORY: usize = 20;

pub fn router(state: AppState) -> Router {
    let privileged = Router::new()
        .route("/direct-sql", post(direct_sql))
        .route("/analytics", get(analytics))
        .route("/clear-cache", post(clear_cache))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_admin,
        ));

    Router::new()
        .route("/query", post(query))
        .route("/tables", get(tables))
        .route("/health", get(health))
        .merge(privileged)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryFailure>,
}

// --- /query ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub include_query: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub question: String,
    pub response: String,
    pub category: String,
    pub tables: Vec<String>,
    /// Milliseconds
    pub execution_time: u64,
    pub row_count: usize,
    pub from_cache: bool,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ApiResponse<QueryData>>, ApiError> {
    let span = info_span!("query", request_id = %Uuid::new_v4());
    async move {
        info!(question = %request.question, use_cache = request.use_cache, "Question received");
        let answer = state
            .agent
            .answer(&request.question, request.use_cache)
            .await?;

        let outcome = answer.outcome;
        let data = QueryData {
            question: answer.question,
            response: answer.response,
            category: answer.category,
            tables: answer.tables,
            execution_time: outcome.execution_time_ms,
            row_count: outcome.row_count,
            from_cache: outcome.from_cache,
            truncated: outcome.truncated,
            sql_query: request.include_query.then_some(outcome.sql),
        };
        Ok::<_, ApiError>(Json(ApiResponse {
            success: outcome.success,
            data,
            error: outcome.error,
        }))
    }
    .instrument(span)
    .await
}

// --- /direct-sql ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSqlRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSqlData {
    pub sql: String,
    pub rows: Vec<JsonRow>,
    pub row_count: usize,
    pub execution_time: u64,
    pub from_cache: bool,
    pub truncated: bool,
}

async fn direct_sql(
    State(state): State<AppState>,
    Json(request): Json<DirectSqlRequest>,
) -> Result<Response, ApiError> {
    let outcome = state
        .agent
        .run_direct_sql(&request.query, request.use_cache)
        .await?;

    let status = match &outcome.error {
        Some(failure) => status_for_kind(&failure.kind),
        None => StatusCode::OK,
    };
    let body = ApiResponse {
        success: outcome.success,
        data: DirectSqlData {
            sql: outcome.sql,
            row_count: outcome.row_count,
            rows: outcome.rows,
            execution_time: outcome.execution_time_ms,
            from_cache: outcome.from_cache,
            truncated: outcome.truncated,
        },
        error: outcome.error,
    };
    Ok((status, Json(body)).into_response())
}

// --- /analytics ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCounts {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub metrics: Metrics,
    pub success_rate: f64,
    pub cache: CacheStatus,
    pub recent_history: Vec<QueryHistoryRecord>,
    pub tables: TableCounts,
}

async fn analytics(State(state): State<AppState>) -> Json<ApiResponse<AnalyticsData>> {
    let snapshot = state.agent.execution().analytics(ANALYTICS_HISTORY).await;
    let tables = TableCounts {
        total: state.agent.catalog().len(),
        by_category: state
            .agent
            .categories()
            .iter()
            .map(|c| (c.name.clone(), c.tables.len()))
            .collect(),
    };
    Json(ApiResponse {
        success: true,
        data: AnalyticsData {
            metrics: snapshot.metrics,
            success_rate: snapshot.success_rate,
            cache: snapshot.cache,
            recent_history: snapshot.recent_history,
            tables,
        },
        error: None,
    })
}

// --- /clear-cache ---

#[derive(Debug, Serialize)]
pub struct ClearCacheData {
    pub message: String,
    pub cleared: usize,
}

async fn clear_cache(State(state): State<AppState>) -> Json<ApiResponse<ClearCacheData>> {
    let cleared = state.agent.execution().clear_cache().await;
    Json(ApiResponse {
        success: true,
        data: ClearCacheData {
            message: "Cache cleared successfully".to_string(),
            cleared,
        },
        error: None,
    })
}

// --- /tables ---

#[derive(Debug, Serialize)]
pub struct TablesData {
    pub categories: Vec<CategoryDefinition>,
    pub tables: Vec<TableSummary>,
}

async fn tables(State(state): State<AppState>) -> Json<ApiResponse<TablesData>> {
    Json(ApiResponse {
        success: true,
        data: TablesData {
            categories: state.agent.categories().iter().cloned().collect(),
            tables: state.agent.catalog().summaries(),
        },
        error: None,
    })
}

// --- /health ---

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub database: &'static str,
    pub llm: &'static str,
    pub agent: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub services: HealthServices,
    pub metrics: Metrics,
    pub cache_size: usize,
    pub tables_loaded: usize,
}

async fn health(State(state): State<AppState>) -> Response {
    let execution = state.agent.execution();
    let database_ok = execution.ping().await;
    let llm_ok = state.agent.model().is_configured();

    let body = HealthResponse {
        success: database_ok,
        status: if database_ok { "healthy" } else { "degraded" },
        services: HealthServices {
            database: if database_ok { "connected" } else { "disconnected" },
            llm: if llm_ok { "configured" } else { "not_configured" },
            agent: "ready",
        },
        metrics: execution.metrics().await,
        cache_size: execution.cache_len().await,
        tables_loaded: state.agent.catalog().len(),
    };
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}
