//! Park and ride detail endpoints.
//!
//! Entity views backing the detail pages: the park row with its rides and
//! latest activity snapshot, and the ride row with its classification and
//! latest status snapshot. Unknown ids are 404s.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use parkpulse_core::error::ApiError;
use parkpulse_core::types::{
    Park, ParkActivitySnapshot, Ride, RideClassification, RideStatusSnapshot,
};
use parkpulse_stats::types::{
    ParkDailyRow, ParkHourlyRow, ParkWeeklyRow, RideDailyRow, RideHourlyRow, RideWeeklyRow,
};
use parkpulse_stats::{daily, hourly, weekly};

use crate::app::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Create the detail router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/parks/:park_id", get(park_detail))
        .route("/api/rides/:ride_id", get(ride_detail))
}

/// Park detail response.
#[derive(Debug, Serialize)]
pub struct ParkDetail {
    #[serde(flatten)]
    pub park: Park,
    pub rides: Vec<Ride>,
    pub latest_snapshot: Option<ParkActivitySnapshot>,
    pub recent_hours: Vec<ParkHourlyRow>,
    pub recent_days: Vec<ParkDailyRow>,
    pub recent_weeks: Vec<ParkWeeklyRow>,
}

/// Ride detail response.
#[derive(Debug, Serialize)]
pub struct RideDetail {
    #[serde(flatten)]
    pub ride: Ride,
    pub classification: Option<RideClassification>,
    pub latest_snapshot: Option<RideStatusSnapshot>,
    pub recent_hours: Vec<RideHourlyRow>,
    pub recent_days: Vec<RideDailyRow>,
    pub recent_weeks: Vec<RideWeeklyRow>,
}

/// One park with its rides and latest activity snapshot.
pub async fn park_detail(
    State(state): State<AppState>,
    Path(park_id): Path<i32>,
) -> ApiResult<Json<ParkDetail>> {
    let park: Park = sqlx::query_as("SELECT * FROM parks WHERE park_id = $1")
        .bind(park_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| ApiError::NotFound(format!("park {park_id}")))?;

    let rides: Vec<Ride> = sqlx::query_as(
        "SELECT * FROM rides WHERE park_id = $1 AND is_active = TRUE ORDER BY name",
    )
    .bind(park_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(e.into()))?;

    // Bounded lookback keeps the scan inside recent partitions
    let latest_snapshot: Option<ParkActivitySnapshot> = sqlx::query_as(
        r"
        SELECT * FROM park_activity_snapshots
        WHERE park_id = $1
          AND recorded_at >= NOW() - INTERVAL '1 day'
        ORDER BY recorded_at DESC
        LIMIT 1
        ",
    )
    .bind(park_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(e.into()))?;

    let recent_hours = hourly::recent_park_hours(&state.db, park_id, 24)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let recent_days = daily::recent_park_days(&state.db, park_id, 7)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let recent_weeks = weekly::park_week_history(&state.db, park_id, 8)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Json(ParkDetail {
        park,
        rides,
        latest_snapshot,
        recent_hours,
        recent_days,
        recent_weeks,
    }))
}

/// One ride with its classification and latest status snapshot.
pub async fn ride_detail(
    State(state): State<AppState>,
    Path(ride_id): Path<i32>,
) -> ApiResult<Json<RideDetail>> {
    let ride: Ride = sqlx::query_as("SELECT * FROM rides WHERE ride_id = $1")
        .bind(ride_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| ApiError::NotFound(format!("ride {ride_id}")))?;

    let classification: Option<RideClassification> =
        sqlx::query_as("SELECT * FROM ride_classifications WHERE ride_id = $1")
            .bind(ride_id)
            .fetch_optional(&state.db)
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

    let latest_snapshot: Option<RideStatusSnapshot> = sqlx::query_as(
        r"
        SELECT * FROM ride_status_snapshots
        WHERE ride_id = $1
          AND recorded_at >= NOW() - INTERVAL '1 day'
        ORDER BY recorded_at DESC
        LIMIT 1
        ",
    )
    .bind(ride_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(e.into()))?;

    let recent_hours = hourly::recent_ride_hours(&state.db, ride_id, 24)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let recent_days = daily::recent_ride_days(&state.db, ride_id, 7)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let recent_weeks = weekly::ride_week_history(&state.db, ride_id, 8)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Json(RideDetail {
        ride,
        classification,
        latest_snapshot,
        recent_hours,
        recent_days,
        recent_weeks,
    }))
}
