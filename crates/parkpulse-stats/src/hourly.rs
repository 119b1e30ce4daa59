//! Hourly aggregation.
//!
//! For each UTC hour with at least one snapshot, derive per-ride and
//! per-park hourly rows. Hours with no snapshots get no row; zero-fill is
//! forbidden because phantom zeros would surface in rankings.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::sql::{down_while_open, IS_OPERATING};
use crate::types::{ParkHourlyRow, RideHourlyRow};

/// Upsert ride hourly rows for every UTC hour in `[start_utc, end_utc)`.
///
/// Returns the number of rows written.
pub async fn aggregate_ride_hours(
    pool: &PgPool,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    interval_minutes: i32,
) -> Result<u64, sqlx::Error> {
    let is_operating = IS_OPERATING;
    let is_down_open = down_while_open();

    let query = format!(
        r"
        INSERT INTO ride_hourly_stats
            (ride_id, park_id, hour_start_utc, avg_wait_time_minutes,
             operating_snapshots, down_snapshots, downtime_hours,
             uptime_percentage, snapshot_count, ride_operated)
        SELECT
            rss.ride_id,
            r.park_id,
            date_trunc('hour', rss.recorded_at) AS hour_start_utc,
            ROUND(AVG(CASE WHEN rss.wait_time > 0 THEN rss.wait_time END)::numeric, 2)::FLOAT8,
            SUM(CASE WHEN {is_operating} THEN 1 ELSE 0 END)::INT,
            SUM(CASE WHEN {is_down_open} THEN 1 ELSE 0 END)::INT,
            ROUND((SUM(CASE WHEN {is_down_open} THEN 1 ELSE 0 END) * $3::FLOAT8 / 60.0)::numeric, 2)::FLOAT8,
            CASE WHEN SUM(CASE WHEN pas.park_appears_open = TRUE THEN 1 ELSE 0 END) > 0
                 THEN ROUND((100.0 * SUM(CASE WHEN pas.park_appears_open = TRUE AND {is_operating} THEN 1 ELSE 0 END)
                             / SUM(CASE WHEN pas.park_appears_open = TRUE THEN 1 ELSE 0 END))::numeric, 2)::FLOAT8
                 ELSE NULL END,
            COUNT(*)::INT,
            BOOL_OR({is_operating})
        FROM ride_status_snapshots rss
        JOIN rides r ON r.ride_id = rss.ride_id
        JOIN parks p ON p.park_id = r.park_id
        LEFT JOIN park_activity_snapshots pas
            ON pas.park_id = r.park_id AND pas.recorded_at = rss.recorded_at
        WHERE rss.recorded_at >= $1 AND rss.recorded_at < $2
        GROUP BY rss.ride_id, r.park_id, date_trunc('hour', rss.recorded_at)
        ON CONFLICT (ride_id, hour_start_utc)
        DO UPDATE SET
            avg_wait_time_minutes = EXCLUDED.avg_wait_time_minutes,
            operating_snapshots = EXCLUDED.operating_snapshots,
            down_snapshots = EXCLUDED.down_snapshots,
            downtime_hours = EXCLUDED.downtime_hours,
            uptime_percentage = EXCLUDED.uptime_percentage,
            snapshot_count = EXCLUDED.snapshot_count,
            ride_operated = EXCLUDED.ride_operated,
            updated_at = NOW()
        "
    );

    let result = sqlx::query(&query)
        .bind(start_utc)
        .bind(end_utc)
        .bind(interval_minutes)
        .execute(pool)
        .await?;

    debug!(rows = result.rows_affected(), "Upserted ride hourly stats");
    Ok(result.rows_affected())
}

/// Recent hourly rows for one park, oldest first.
pub async fn recent_park_hours(
    pool: &PgPool,
    park_id: i32,
    hours: i64,
) -> Result<Vec<ParkHourlyRow>, sqlx::Error> {
    sqlx::query_as::<_, ParkHourlyRow>(
        r"
        SELECT park_id, hour_start_utc, shame_score, avg_wait_time_minutes,
               rides_operating, rides_down, total_downtime_hours,
               weighted_downtime_hours, effective_park_weight,
               snapshot_count, park_was_open
        FROM park_hourly_stats
        WHERE park_id = $1
          AND hour_start_utc >= NOW() - ($2::BIGINT * INTERVAL '1 hour')
        ORDER BY hour_start_utc
        ",
    )
    .bind(park_id)
    .bind(hours)
    .fetch_all(pool)
    .await
}

/// Recent hourly rows for one ride, oldest first.
pub async fn recent_ride_hours(
    pool: &PgPool,
    ride_id: i32,
    hours: i64,
) -> Result<Vec<RideHourlyRow>, sqlx::Error> {
    sqlx::query_as::<_, RideHourlyRow>(
        r"
        SELECT ride_id, park_id, hour_start_utc, avg_wait_time_minutes,
               operating_snapshots, down_snapshots, downtime_hours,
               uptime_percentage, snapshot_count, ride_operated
        FROM ride_hourly_stats
        WHERE ride_id = $1
          AND hour_start_utc >= NOW() - ($2::BIGINT * INTERVAL '1 hour')
        ORDER BY hour_start_utc
        ",
    )
    .bind(ride_id)
    .bind(hours)
    .fetch_all(pool)
    .await
}

/// Extend `ride_operated` forward within the window: a ride that operated
/// in an earlier hour of the same window counts as operated later too.
pub async fn propagate_ride_operated(
    pool: &PgPool,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE ride_hourly_stats h
        SET ride_operated = TRUE, updated_at = NOW()
        WHERE h.hour_start_utc >= $1 AND h.hour_start_utc < $2
          AND h.ride_operated = FALSE
          AND EXISTS (
              SELECT 1 FROM ride_hourly_stats e
              WHERE e.ride_id = h.ride_id
                AND e.hour_start_utc >= $1
                AND e.hour_start_utc < h.hour_start_utc
                AND e.operating_snapshots > 0
          )
        ",
    )
    .bind(start_utc)
    .bind(end_utc)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Upsert park hourly rows from park activity snapshots.
pub async fn aggregate_park_hours(
    pool: &PgPool,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        INSERT INTO park_hourly_stats
            (park_id, hour_start_utc, shame_score, avg_wait_time_minutes,
             rides_operating, snapshot_count, park_was_open)
        SELECT
            pas.park_id,
            date_trunc('hour', pas.recorded_at) AS hour_start_utc,
            ROUND(AVG(CASE WHEN pas.park_appears_open = TRUE THEN pas.shame_score END)::numeric, 1)::FLOAT8,
            ROUND(AVG(pas.avg_wait_time)::numeric, 2)::FLOAT8,
            MAX(pas.rides_open),
            COUNT(*)::INT,
            BOOL_OR(pas.park_appears_open)
        FROM park_activity_snapshots pas
        WHERE pas.recorded_at >= $1 AND pas.recorded_at < $2
        GROUP BY pas.park_id, date_trunc('hour', pas.recorded_at)
        ON CONFLICT (park_id, hour_start_utc)
        DO UPDATE SET
            shame_score = EXCLUDED.shame_score,
            avg_wait_time_minutes = EXCLUDED.avg_wait_time_minutes,
            rides_operating = EXCLUDED.rides_operating,
            snapshot_count = EXCLUDED.snapshot_count,
            park_was_open = EXCLUDED.park_was_open,
            updated_at = NOW()
        ",
    )
    .bind(start_utc)
    .bind(end_utc)
    .execute(pool)
    .await?;

    debug!(rows = result.rows_affected(), "Upserted park hourly stats");
    Ok(result.rows_affected())
}

/// Fill the ride-derived columns of park hourly rows from the ride hourly
/// rows of the same window. Runs after [`aggregate_ride_hours`].
pub async fn enrich_park_hours(
    pool: &PgPool,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE park_hourly_stats ph
        SET rides_down = sub.rides_down,
            total_downtime_hours = sub.total_downtime_hours,
            weighted_downtime_hours = sub.weighted_downtime_hours,
            effective_park_weight = sub.effective_park_weight,
            updated_at = NOW()
        FROM (
            SELECT
                rh.park_id,
                rh.hour_start_utc,
                (COUNT(*) FILTER (WHERE rh.down_snapshots > 0))::INT AS rides_down,
                ROUND(SUM(rh.downtime_hours)::numeric, 2)::FLOAT8 AS total_downtime_hours,
                ROUND(SUM(rh.downtime_hours * COALESCE(rc.tier_weight, 2))::numeric, 2)::FLOAT8
                    AS weighted_downtime_hours,
                SUM(COALESCE(rc.tier_weight, 2))::FLOAT8 AS effective_park_weight
            FROM ride_hourly_stats rh
            LEFT JOIN ride_classifications rc ON rc.ride_id = rh.ride_id
            WHERE rh.hour_start_utc >= $1 AND rh.hour_start_utc < $2
            GROUP BY rh.park_id, rh.hour_start_utc
        ) sub
        WHERE ph.park_id = sub.park_id AND ph.hour_start_utc = sub.hour_start_utc
        ",
    )
    .bind(start_utc)
    .bind(end_utc)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
