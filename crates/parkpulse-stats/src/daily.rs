//! Daily aggregation.
//!
//! A day is `[00:00 local, next 00:00 local)` in the park's own timezone,
//! converted to UTC for the snapshot scan. Parks in different timezones
//! are processed per timezone so the same calendar date means the same
//! local day everywhere.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use crate::bounds::local_day_bounds_utc;
use crate::sql::{down_while_open, IS_OPERATING};
use crate::types::{ParkDailyRow, RideDailyRow};

/// Distinct active park timezones, optionally restricted to one.
pub async fn park_timezones(
    pool: &PgPool,
    timezone_filter: Option<&str>,
) -> Result<Vec<String>, sqlx::Error> {
    match timezone_filter {
        Some(tz) => Ok(vec![tz.to_string()]),
        None => {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT DISTINCT timezone FROM parks WHERE is_active = TRUE ORDER BY timezone",
            )
            .fetch_all(pool)
            .await?;
            Ok(rows.into_iter().map(|(tz,)| tz).collect())
        }
    }
}

/// Recent daily rows for one ride, oldest first.
pub async fn recent_ride_days(
    pool: &PgPool,
    ride_id: i32,
    days: i64,
) -> Result<Vec<RideDailyRow>, sqlx::Error> {
    sqlx::query_as::<_, RideDailyRow>(
        r"
        SELECT ride_id, stat_date, uptime_minutes, downtime_minutes,
               uptime_percentage, operating_hours_minutes, avg_wait_time,
               min_wait_time, max_wait_time, peak_wait_time,
               status_changes, longest_downtime_minutes
        FROM ride_daily_stats
        WHERE ride_id = $1
          AND stat_date >= CURRENT_DATE - $2::INT
        ORDER BY stat_date
        ",
    )
    .bind(ride_id)
    .bind(days as i32)
    .fetch_all(pool)
    .await
}

/// Recent daily rows for one park, oldest first.
pub async fn recent_park_days(
    pool: &PgPool,
    park_id: i32,
    days: i64,
) -> Result<Vec<ParkDailyRow>, sqlx::Error> {
    sqlx::query_as::<_, ParkDailyRow>(
        r"
        SELECT park_id, stat_date, total_rides_tracked, avg_uptime_percentage,
               shame_score, total_downtime_hours, rides_with_downtime,
               avg_wait_time, peak_wait_time, operating_hours_minutes
        FROM park_daily_stats
        WHERE park_id = $1
          AND stat_date >= CURRENT_DATE - $2::INT
        ORDER BY stat_date
        ",
    )
    .bind(park_id)
    .bind(days as i32)
    .fetch_all(pool)
    .await
}

/// Upsert ride daily rows for one local date and one timezone.
///
/// Returns rows written.
pub async fn aggregate_ride_days(
    pool: &PgPool,
    stat_date: NaiveDate,
    timezone: &str,
    interval_minutes: i32,
) -> Result<u64, sqlx::Error> {
    let (start_utc, end_utc) = local_day_bounds_utc(stat_date, timezone);
    let is_operating = IS_OPERATING;
    let is_down_open = down_while_open();

    let query = format!(
        r"
        INSERT INTO ride_daily_stats
            (ride_id, stat_date, uptime_minutes, downtime_minutes,
             uptime_percentage, operating_hours_minutes,
             avg_wait_time, min_wait_time, max_wait_time, peak_wait_time,
             status_changes, longest_downtime_minutes)
        SELECT
            rss.ride_id,
            $3,
            SUM(CASE WHEN {is_operating} THEN $4 ELSE 0 END)::INT,
            SUM(CASE WHEN {is_down_open} THEN $4 ELSE 0 END)::INT,
            CASE WHEN SUM(CASE WHEN pas.park_appears_open = TRUE THEN 1 ELSE 0 END) > 0
                 THEN ROUND((100.0 * SUM(CASE WHEN pas.park_appears_open = TRUE AND {is_operating} THEN 1 ELSE 0 END)
                             / SUM(CASE WHEN pas.park_appears_open = TRUE THEN 1 ELSE 0 END))::numeric, 2)::FLOAT8
                 ELSE NULL END,
            SUM(CASE WHEN pas.park_appears_open = TRUE THEN $4 ELSE 0 END)::INT,
            ROUND(AVG(CASE WHEN rss.wait_time IS NOT NULL AND {is_operating} THEN rss.wait_time END)::numeric, 2)::FLOAT8,
            MIN(CASE WHEN rss.wait_time IS NOT NULL AND {is_operating} THEN rss.wait_time END),
            MAX(CASE WHEN rss.wait_time IS NOT NULL AND {is_operating} THEN rss.wait_time END),
            MAX(rss.wait_time),
            (SELECT COUNT(*) FROM ride_status_changes c
              WHERE c.ride_id = rss.ride_id
                AND c.changed_at >= $1 AND c.changed_at < $2)::INT,
            (SELECT MAX(c.downtime_duration_minutes) FROM ride_status_changes c
              WHERE c.ride_id = rss.ride_id
                AND c.changed_at >= $1 AND c.changed_at < $2)
        FROM ride_status_snapshots rss
        JOIN rides r ON r.ride_id = rss.ride_id
        JOIN parks p ON p.park_id = r.park_id AND p.timezone = $5
        LEFT JOIN park_activity_snapshots pas
            ON pas.park_id = r.park_id AND pas.recorded_at = rss.recorded_at
        WHERE rss.recorded_at >= $1 AND rss.recorded_at < $2
        GROUP BY rss.ride_id
        ON CONFLICT (ride_id, stat_date)
        DO UPDATE SET
            uptime_minutes = EXCLUDED.uptime_minutes,
            downtime_minutes = EXCLUDED.downtime_minutes,
            uptime_percentage = EXCLUDED.uptime_percentage,
            operating_hours_minutes = EXCLUDED.operating_hours_minutes,
            avg_wait_time = EXCLUDED.avg_wait_time,
            min_wait_time = EXCLUDED.min_wait_time,
            max_wait_time = EXCLUDED.max_wait_time,
            peak_wait_time = EXCLUDED.peak_wait_time,
            status_changes = EXCLUDED.status_changes,
            longest_downtime_minutes = EXCLUDED.longest_downtime_minutes
        "
    );

    let result = sqlx::query(&query)
        .bind(start_utc)
        .bind(end_utc)
        .bind(stat_date)
        .bind(interval_minutes)
        .bind(timezone)
        .execute(pool)
        .await?;

    debug!(
        %stat_date,
        timezone,
        rows = result.rows_affected(),
        "Upserted ride daily stats"
    );
    Ok(result.rows_affected())
}

/// Upsert park daily rows by rolling up the rides of each park for the
/// date, plus the average hourly shame score over open hours.
pub async fn aggregate_park_days(
    pool: &PgPool,
    stat_date: NaiveDate,
    timezone: &str,
) -> Result<u64, sqlx::Error> {
    let (start_utc, end_utc) = local_day_bounds_utc(stat_date, timezone);

    let result = sqlx::query(
        r"
        INSERT INTO park_daily_stats
            (park_id, stat_date, total_rides_tracked, avg_uptime_percentage,
             shame_score, total_downtime_hours, rides_with_downtime,
             avg_wait_time, peak_wait_time, operating_hours_minutes)
        SELECT
            r.park_id,
            $3,
            COUNT(*)::INT,
            ROUND(AVG(rds.uptime_percentage)::numeric, 2)::FLOAT8,
            (SELECT ROUND(AVG(ph.shame_score)::numeric, 1)::FLOAT8
               FROM park_hourly_stats ph
              WHERE ph.park_id = r.park_id
                AND ph.hour_start_utc >= $1 AND ph.hour_start_utc < $2
                AND ph.park_was_open = TRUE),
            ROUND((SUM(rds.downtime_minutes) / 60.0)::numeric, 2)::FLOAT8,
            SUM(CASE WHEN rds.downtime_minutes > 0 THEN 1 ELSE 0 END)::INT,
            ROUND(AVG(rds.avg_wait_time)::numeric, 2)::FLOAT8,
            MAX(rds.peak_wait_time),
            COALESCE(ROUND(AVG(rds.operating_hours_minutes))::INT, 0)
        FROM ride_daily_stats rds
        JOIN rides r ON r.ride_id = rds.ride_id
        JOIN parks p ON p.park_id = r.park_id AND p.timezone = $4
        WHERE rds.stat_date = $3
        GROUP BY r.park_id
        ON CONFLICT (park_id, stat_date)
        DO UPDATE SET
            total_rides_tracked = EXCLUDED.total_rides_tracked,
            avg_uptime_percentage = EXCLUDED.avg_uptime_percentage,
            shame_score = EXCLUDED.shame_score,
            total_downtime_hours = EXCLUDED.total_downtime_hours,
            rides_with_downtime = EXCLUDED.rides_with_downtime,
            avg_wait_time = EXCLUDED.avg_wait_time,
            peak_wait_time = EXCLUDED.peak_wait_time,
            operating_hours_minutes = EXCLUDED.operating_hours_minutes
        ",
    )
    .bind(start_utc)
    .bind(end_utc)
    .bind(stat_date)
    .bind(timezone)
    .execute(pool)
    .await?;

    debug!(
        %stat_date,
        timezone,
        rows = result.rows_affected(),
        "Upserted park daily stats"
    );
    Ok(result.rows_affected())
}
