//! Heatmap endpoint.
//!
//! Reshapes chart output into `{entities, time_labels, matrix}`. LIVE is
//! rejected with a 400 before any query runs.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;

use parkpulse_core::error::ApiError;
use parkpulse_core::{AppCache, ParkFilter, Period};
use parkpulse_queries::{charts, heatmap, period};

use crate::app::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Create the heatmap router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/heatmap", get(get_heatmap))
}

/// Heatmap query parameters.
#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    /// today, yesterday, last_week, last_month (live rejected)
    pub period: Option<String>,
    /// parks or rides
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    /// all-parks or disney-universal
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_filter() -> String {
    "all-parks".to_string()
}

const fn default_limit() -> i64 {
    15
}

/// Heatmap endpoint.
pub async fn get_heatmap(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let raw_period = query
        .period
        .as_deref()
        .ok_or_else(|| ApiError::Validation("period parameter is required".into()))?;
    let entity_type = query
        .entity_type
        .as_deref()
        .ok_or_else(|| ApiError::Validation("type parameter is required".into()))?;

    let period = Period::parse(raw_period).map_err(ApiError::Validation)?;
    heatmap::validate_period(period).map_err(ApiError::Validation)?;
    let filter = ParkFilter::parse(&query.filter).map_err(ApiError::Validation)?;

    let key = AppCache::query_key(
        &format!("heatmap/{entity_type}"),
        raw_period,
        &query.filter,
        query.limit,
    );
    if let Some(hit) = state.cache.heatmaps.get(&key).await {
        return Ok(Json(hit));
    }

    let response = match entity_type {
        "parks" => {
            let chart = match period {
                Period::Today => charts::park_shame_hourly(
                    &state.db,
                    filter,
                    query.limit,
                    state.settings.collector.use_hourly_tables,
                )
                .await
                .map_err(ApiError::Internal)?,
                _ => {
                    let range = period_dates(period);
                    charts::park_shame_daily(&state.db, range.0, range.1, filter, query.limit)
                        .await
                        .map_err(ApiError::Internal)?
                }
            };
            heatmap::from_chart(chart, period, "shame_score", "score", "Park shame score")
        }
        "rides" => {
            let chart = match period {
                Period::Today => charts::ride_wait_hourly(&state.db, filter, query.limit)
                    .await
                    .map_err(ApiError::Internal)?,
                _ => {
                    let range = period_dates(period);
                    charts::ride_wait_daily_between(
                        &state.db,
                        range.0,
                        range.1,
                        filter,
                        query.limit,
                    )
                    .await
                    .map_err(ApiError::Internal)?
                }
            };
            heatmap::from_chart(chart, period, "avg_wait", "minutes", "Ride wait times")
        }
        other => {
            return Err(ApiError::Validation(format!(
                "invalid type '{other}' (expected parks or rides)"
            )))
        }
    };

    let value = serde_json::to_value(response).map_err(|e| ApiError::Internal(e.into()))?;
    state.cache.heatmaps.insert(key, value.clone()).await;
    Ok(Json(value))
}

/// Closed date range for the non-today periods.
fn period_dates(period: Period) -> (chrono::NaiveDate, chrono::NaiveDate) {
    match period {
        Period::Yesterday => {
            let y = period::yesterday_pacific();
            (y, y)
        }
        Period::LastMonth => {
            let range = period::last_month_range();
            (range.start_date, range.end_date)
        }
        // LastWeek and any future period default to the previous week
        _ => {
            let range = period::last_week_range();
            (range.start_date, range.end_date)
        }
    }
}
