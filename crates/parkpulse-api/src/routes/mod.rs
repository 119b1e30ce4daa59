//! API routes module.
//!
//! Organizes all API endpoints.

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::app::AppState;

pub mod admin;
pub mod charts;
pub mod health;
pub mod heatmap;
pub mod parks;
pub mod rankings;

/// `OpenAPI` documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ParkPulse API",
        version = "0.1.0",
        description = "Theme park reliability warehouse: rankings, charts, and heatmaps"
    ),
    paths(
        health::health_check,
        rankings::park_downtime,
        rankings::park_waittimes,
        rankings::ride_downtime,
        rankings::ride_waittimes,
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "rankings", description = "Park and ride rankings"),
        (name = "charts", description = "Chart.js time series"),
        (name = "heatmap", description = "Heatmap matrices"),
        (name = "admin", description = "Import and aggregation administration"),
    )
)]
pub struct ApiDoc;

/// Router exposing the `OpenAPI` document.
pub fn api_docs() -> Router<AppState> {
    Router::new().route("/api/openapi.json", get(openapi_json))
}

/// Serve `OpenAPI` JSON specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
