//! Chart endpoints.
//!
//! Chart.js-shaped `{labels, datasets}` responses. Missing data points
//! stay `null` in the datasets.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;

use parkpulse_core::error::ApiError;
use parkpulse_core::{AppCache, ParkFilter};
use parkpulse_queries::charts;

use crate::app::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Create the charts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/charts/ride-waittimes", get(ride_waittimes_chart))
        .route("/api/charts/park-shame", get(park_shame_chart))
}

/// Chart query parameters.
#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    /// daily or hourly
    #[serde(default = "default_granularity")]
    pub granularity: String,
    /// Days of history for daily charts
    #[serde(default = "default_days")]
    pub days: i64,
    /// all-parks or disney-universal
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Number of entities charted
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_granularity() -> String {
    "daily".to_string()
}

const fn default_days() -> i64 {
    7
}

fn default_filter() -> String {
    "all-parks".to_string()
}

const fn default_limit() -> i64 {
    10
}

fn parse_filter(raw: &str) -> Result<ParkFilter, ApiError> {
    ParkFilter::parse(raw).map_err(ApiError::Validation)
}

/// Ride wait-time history chart.
pub async fn ride_waittimes_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = parse_filter(&query.filter)?;
    if !(1..=90).contains(&query.days) {
        return Err(ApiError::Validation(format!(
            "days {} outside 1-90",
            query.days
        )));
    }

    let key = AppCache::query_key(
        "charts/ride-waittimes",
        &format!("{}:{}", query.granularity, query.days),
        &query.filter,
        query.limit,
    );
    if let Some(hit) = state.cache.charts.get(&key).await {
        return Ok(Json(hit));
    }

    let chart = match query.granularity.as_str() {
        "daily" => charts::ride_wait_daily(&state.db, query.days, filter, query.limit)
            .await
            .map_err(ApiError::Internal)?,
        "hourly" => charts::ride_wait_hourly(&state.db, filter, query.limit)
            .await
            .map_err(ApiError::Internal)?,
        other => {
            return Err(ApiError::Validation(format!(
                "invalid granularity '{other}' (expected daily or hourly)"
            )))
        }
    };

    let value = serde_json::to_value(chart).map_err(|e| ApiError::Internal(e.into()))?;
    state.cache.charts.insert(key, value.clone()).await;
    Ok(Json(value))
}

/// Park shame-score history chart.
pub async fn park_shame_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = parse_filter(&query.filter)?;

    let key = AppCache::query_key(
        "charts/park-shame",
        &query.granularity,
        &query.filter,
        query.limit,
    );
    if let Some(hit) = state.cache.charts.get(&key).await {
        return Ok(Json(hit));
    }

    let chart = match query.granularity.as_str() {
        "hourly" => charts::park_shame_hourly(
            &state.db,
            filter,
            query.limit,
            state.settings.collector.use_hourly_tables,
        )
        .await
        .map_err(ApiError::Internal)?,
        "daily" => {
            let end = parkpulse_queries::period::yesterday_pacific();
            let start = end - chrono::Duration::days(query.days - 1);
            charts::park_shame_daily(&state.db, start, end, filter, query.limit)
                .await
                .map_err(ApiError::Internal)?
        }
        other => {
            return Err(ApiError::Validation(format!(
                "invalid granularity '{other}' (expected daily or hourly)"
            )))
        }
    };

    let value = serde_json::to_value(chart).map_err(|e| ApiError::Internal(e.into()))?;
    state.cache.charts.insert(key, value.clone()).await;
    Ok(Json(value))
}
