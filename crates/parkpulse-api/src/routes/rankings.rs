//! Ranking endpoints.
//!
//! Each endpoint accepts `period`, `filter`, and `limit`; invalid enum
//! values are 400s. Results are cached briefly, keyed by the full query
//! shape.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;

use parkpulse_core::error::ApiError;
use parkpulse_core::{AppCache, ParkFilter, Period};
use parkpulse_queries::rankings::RankingOptions;

use crate::app::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Create the rankings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/parks/downtime", get(park_downtime))
        .route("/api/parks/waittimes", get(park_waittimes))
        .route("/api/rides/downtime", get(ride_downtime))
        .route("/api/rides/waittimes", get(ride_waittimes))
}

/// Query parameters shared by all ranking endpoints.
#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    /// live, today, yesterday, last_week, last_month
    #[serde(default = "default_period")]
    pub period: String,
    /// all-parks or disney-universal
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Maximum rows returned
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_period() -> String {
    "live".to_string()
}

fn default_filter() -> String {
    "all-parks".to_string()
}

const fn default_limit() -> i64 {
    50
}

fn parse_options(state: &AppState, query: &RankingQuery) -> Result<RankingOptions, ApiError> {
    let period = Period::parse(&query.period).map_err(ApiError::Validation)?;
    let filter = ParkFilter::parse(&query.filter).map_err(ApiError::Validation)?;
    if !(1..=500).contains(&query.limit) {
        return Err(ApiError::Validation(format!(
            "limit {} outside 1-500",
            query.limit
        )));
    }

    Ok(RankingOptions {
        period,
        filter,
        limit: query.limit,
        use_hourly_tables: state.settings.collector.use_hourly_tables,
        interval_minutes: state.settings.collector.snapshot_interval_minutes,
        live_window_hours: state.settings.collector.live_window_hours,
    })
}

async fn cached_rankings<F, Fut>(
    state: &AppState,
    endpoint: &str,
    query: &RankingQuery,
    opts: RankingOptions,
    run: F,
) -> ApiResult<Json<serde_json::Value>>
where
    F: FnOnce(RankingOptions) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<serde_json::Value>>,
{
    let key = AppCache::query_key(endpoint, &query.period, &query.filter, query.limit);
    if let Some(hit) = state.cache.rankings.get(&key).await {
        return Ok(Json(hit));
    }

    let value = run(opts).await.map_err(ApiError::Internal)?;
    state.cache.rankings.insert(key, value.clone()).await;
    Ok(Json(value))
}

/// Park downtime rankings.
#[utoipa::path(
    get,
    path = "/api/parks/downtime",
    tag = "rankings",
    params(
        ("period" = String, Query, description = "live, today, yesterday, last_week, last_month"),
        ("filter" = String, Query, description = "all-parks or disney-universal"),
        ("limit" = i64, Query, description = "Maximum rows (1-500)")
    ),
    responses(
        (status = 200, description = "Ranked parks"),
        (status = 400, description = "Invalid period or filter")
    )
)]
pub async fn park_downtime(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let opts = parse_options(&state, &query)?;
    let pool = state.db.clone();
    cached_rankings(&state, "parks/downtime", &query, opts, |opts| async move {
        let rows = parkpulse_queries::park_downtime_rankings(&pool, opts).await?;
        Ok(serde_json::to_value(rows)?)
    })
    .await
}

/// Park wait-time rankings.
#[utoipa::path(
    get,
    path = "/api/parks/waittimes",
    tag = "rankings",
    params(
        ("period" = String, Query, description = "live, today, yesterday, last_week, last_month"),
        ("filter" = String, Query, description = "all-parks or disney-universal"),
        ("limit" = i64, Query, description = "Maximum rows (1-500)")
    ),
    responses(
        (status = 200, description = "Ranked parks"),
        (status = 400, description = "Invalid period or filter")
    )
)]
pub async fn park_waittimes(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let opts = parse_options(&state, &query)?;
    let pool = state.db.clone();
    cached_rankings(&state, "parks/waittimes", &query, opts, |opts| async move {
        let rows = parkpulse_queries::park_wait_rankings(&pool, opts).await?;
        Ok(serde_json::to_value(rows)?)
    })
    .await
}

/// Ride downtime rankings.
#[utoipa::path(
    get,
    path = "/api/rides/downtime",
    tag = "rankings",
    params(
        ("period" = String, Query, description = "live, today, yesterday, last_week, last_month"),
        ("filter" = String, Query, description = "all-parks or disney-universal"),
        ("limit" = i64, Query, description = "Maximum rows (1-500)")
    ),
    responses(
        (status = 200, description = "Ranked rides"),
        (status = 400, description = "Invalid period or filter")
    )
)]
pub async fn ride_downtime(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let opts = parse_options(&state, &query)?;
    let pool = state.db.clone();
    cached_rankings(&state, "rides/downtime", &query, opts, |opts| async move {
        let rows = parkpulse_queries::ride_downtime_rankings(&pool, opts).await?;
        Ok(serde_json::to_value(rows)?)
    })
    .await
}

/// Ride wait-time rankings.
#[utoipa::path(
    get,
    path = "/api/rides/waittimes",
    tag = "rankings",
    params(
        ("period" = String, Query, description = "live, today, yesterday, last_week, last_month"),
        ("filter" = String, Query, description = "all-parks or disney-universal"),
        ("limit" = i64, Query, description = "Maximum rows (1-500)")
    ),
    responses(
        (status = 200, description = "Ranked rides"),
        (status = 400, description = "Invalid period or filter")
    )
)]
pub async fn ride_waittimes(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let opts = parse_options(&state, &query)?;
    let pool = state.db.clone();
    cached_rankings(&state, "rides/waittimes", &query, opts, |opts| async move {
        let rows = parkpulse_queries::ride_wait_rankings(&pool, opts).await?;
        Ok(serde_json::to_value(rows)?)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query: RankingQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.period, "live");
        assert_eq!(query.filter, "all-parks");
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn test_period_parse_rejects_garbage() {
        assert!(Period::parse("this_week").is_err());
        assert!(ParkFilter::parse("disney-only").is_err());
    }
}
