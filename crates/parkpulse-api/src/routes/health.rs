//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::app::AppState;

/// Health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall health status
    pub status: String,
    /// API version
    pub version: String,
    /// Current server timestamp (ISO 8601)
    pub timestamp: DateTime<Utc>,
    /// Database connection status
    pub database: DatabaseStatus,
    /// Query cache sizes
    pub cache: CacheStatus,
}

/// Query cache entry counts.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub rankings_entries: u64,
    pub charts_entries: u64,
    pub heatmaps_entries: u64,
}

/// Database connection status.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    /// Whether the database is connected
    pub connected: bool,
    /// Response time in milliseconds (if connected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Error message (if not connected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Health check successful", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = check_database(&state.db).await;
    let cache_stats = state.cache.get_stats();

    let status = if database.connected {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database,
        cache: CacheStatus {
            rankings_entries: cache_stats.rankings_size,
            charts_entries: cache_stats.charts_size,
            heatmaps_entries: cache_stats.heatmaps_size,
        },
    })
}

async fn check_database(pool: &PgPool) -> DatabaseStatus {
    let start = std::time::Instant::now();
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => DatabaseStatus {
            connected: true,
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => DatabaseStatus {
            connected: false,
            response_time_ms: None,
            error: Some(e.to_string()),
        },
    }
}
