//! Raw-snapshot window aggregation.
//!
//! The hybrid TODAY query needs the current in-progress hour computed
//! directly from raw snapshots with exactly the logic the hourly job
//! uses. The same path serves the whole day when hourly tables are
//! disabled. All scans are bounded by `recorded_at` ranges so monthly
//! partition pruning applies.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::sql::down_while_open;

/// Per-park aggregate over one raw window.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ParkWindowStats {
    pub park_id: i32,
    /// Average stored shame score over open snapshots, one decimal
    pub shame_score: Option<f64>,
    pub total_downtime_hours: f64,
    /// Distinct rides with at least one down snapshot in the window
    pub rides_down: i32,
    pub snapshot_count: i32,
    pub rides_reporting: i32,
    pub avg_wait_time: Option<f64>,
    pub peak_wait_time: Option<i32>,
}

/// Aggregate raw snapshots over `[start_utc, end_utc]` per park.
///
/// `disney_universal_only` restricts the scan; `interval_minutes` converts
/// down-snapshot counts into hours the same way the hourly job does.
pub async fn park_window_stats(
    pool: &PgPool,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    interval_minutes: i32,
    disney_universal_only: bool,
) -> Result<Vec<ParkWindowStats>, sqlx::Error> {
    let is_down_open = down_while_open();
    let filter = if disney_universal_only {
        "AND (p.is_disney = TRUE OR p.is_universal = TRUE)"
    } else {
        ""
    };

    let query = format!(
        r"
        WITH park_side AS (
            SELECT
                pas.park_id,
                ROUND(AVG(CASE WHEN pas.park_appears_open = TRUE THEN pas.shame_score END)::numeric, 1)::FLOAT8
                    AS shame_score,
                COUNT(*)::INT AS snapshot_count,
                ROUND(AVG(pas.avg_wait_time)::numeric, 1)::FLOAT8 AS avg_wait_time,
                MAX(pas.max_wait_time) AS peak_wait_time
            FROM park_activity_snapshots pas
            JOIN parks p ON p.park_id = pas.park_id
            WHERE pas.recorded_at >= $1 AND pas.recorded_at <= $2
              AND p.is_active = TRUE
              {filter}
            GROUP BY pas.park_id
        ),
        ride_side AS (
            SELECT
                r.park_id,
                (COUNT(DISTINCT rss.ride_id) FILTER (WHERE {is_down_open}))::INT AS rides_down,
                ROUND((SUM(CASE WHEN {is_down_open} THEN 1 ELSE 0 END) * $3::FLOAT8 / 60.0)::numeric, 2)::FLOAT8
                    AS total_downtime_hours,
                COUNT(DISTINCT rss.ride_id)::INT AS rides_reporting
            FROM ride_status_snapshots rss
            JOIN rides r ON r.ride_id = rss.ride_id
            JOIN parks p ON p.park_id = r.park_id
            LEFT JOIN park_activity_snapshots pas
                ON pas.park_id = r.park_id AND pas.recorded_at = rss.recorded_at
            WHERE rss.recorded_at >= $1 AND rss.recorded_at <= $2
              AND r.is_active = TRUE
              AND p.is_active = TRUE
              {filter}
            GROUP BY r.park_id
        )
        SELECT
            park_side.park_id,
            park_side.shame_score,
            COALESCE(ride_side.total_downtime_hours, 0)::FLOAT8 AS total_downtime_hours,
            COALESCE(ride_side.rides_down, 0) AS rides_down,
            park_side.snapshot_count,
            COALESCE(ride_side.rides_reporting, 0) AS rides_reporting,
            park_side.avg_wait_time,
            park_side.peak_wait_time
        FROM park_side
        LEFT JOIN ride_side ON ride_side.park_id = park_side.park_id
        "
    );

    sqlx::query_as::<_, ParkWindowStats>(&query)
        .bind(start_utc)
        .bind(end_utc)
        .bind(interval_minutes)
        .fetch_all(pool)
        .await
}
