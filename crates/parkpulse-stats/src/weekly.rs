//! Weekly aggregation.
//!
//! Weekly rows derive from daily rows only, never from raw snapshots.
//! Keys are ISO (year, week); `week_start_date` is the Monday of the week.
//! Days missing from the week stay missing: sums run over present rows.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use crate::bounds::iso_week_of;
use crate::types::{ParkWeeklyRow, RideWeeklyRow};

/// Weekly history for one ride, newest first. Carries the stored
/// `trend_vs_previous_week`.
pub async fn ride_week_history(
    pool: &PgPool,
    ride_id: i32,
    weeks: i64,
) -> Result<Vec<RideWeeklyRow>, sqlx::Error> {
    sqlx::query_as::<_, RideWeeklyRow>(
        r"
        SELECT ride_id, year, week_number, week_start_date,
               uptime_minutes, downtime_minutes, operating_hours_minutes,
               uptime_percentage, avg_wait_time, peak_wait_time,
               status_changes, trend_vs_previous_week
        FROM ride_weekly_stats
        WHERE ride_id = $1
        ORDER BY week_start_date DESC
        LIMIT $2
        ",
    )
    .bind(ride_id)
    .bind(weeks)
    .fetch_all(pool)
    .await
}

/// Weekly history for one park, newest first.
pub async fn park_week_history(
    pool: &PgPool,
    park_id: i32,
    weeks: i64,
) -> Result<Vec<ParkWeeklyRow>, sqlx::Error> {
    sqlx::query_as::<_, ParkWeeklyRow>(
        r"
        SELECT park_id, year, week_number, week_start_date,
               total_rides_tracked, avg_uptime_percentage, total_downtime_hours,
               rides_with_downtime, avg_wait_time, peak_wait_time,
               trend_vs_previous_week
        FROM park_weekly_stats
        WHERE park_id = $1
        ORDER BY week_start_date DESC
        LIMIT $2
        ",
    )
    .bind(park_id)
    .bind(weeks)
    .fetch_all(pool)
    .await
}

/// Upsert ride weekly rows for the ISO week containing `target_date`.
pub async fn aggregate_ride_weeks(
    pool: &PgPool,
    target_date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let (year, week, monday) = iso_week_of(target_date);
    let week_end = monday + chrono::Duration::days(7);

    let result = sqlx::query(
        r"
        INSERT INTO ride_weekly_stats
            (ride_id, year, week_number, week_start_date,
             uptime_minutes, downtime_minutes, operating_hours_minutes,
             uptime_percentage, avg_wait_time, peak_wait_time, status_changes)
        SELECT
            rds.ride_id,
            $1,
            $2,
            $3,
            SUM(rds.uptime_minutes)::INT,
            SUM(rds.downtime_minutes)::INT,
            SUM(rds.operating_hours_minutes)::INT,
            CASE WHEN SUM(rds.operating_hours_minutes) > 0
                 THEN ROUND((100.0 * SUM(rds.uptime_minutes)
                             / SUM(rds.operating_hours_minutes))::numeric, 2)::FLOAT8
                 ELSE NULL END,
            CASE WHEN SUM(rds.operating_hours_minutes) > 0
                 THEN ROUND((SUM(rds.avg_wait_time * rds.operating_hours_minutes)
                             / SUM(rds.operating_hours_minutes))::numeric, 2)::FLOAT8
                 ELSE NULL END,
            MAX(rds.peak_wait_time),
            SUM(rds.status_changes)::INT
        FROM ride_daily_stats rds
        WHERE rds.stat_date >= $3 AND rds.stat_date < $4
        GROUP BY rds.ride_id
        ON CONFLICT (ride_id, year, week_number)
        DO UPDATE SET
            week_start_date = EXCLUDED.week_start_date,
            uptime_minutes = EXCLUDED.uptime_minutes,
            downtime_minutes = EXCLUDED.downtime_minutes,
            operating_hours_minutes = EXCLUDED.operating_hours_minutes,
            uptime_percentage = EXCLUDED.uptime_percentage,
            avg_wait_time = EXCLUDED.avg_wait_time,
            peak_wait_time = EXCLUDED.peak_wait_time,
            status_changes = EXCLUDED.status_changes
        ",
    )
    .bind(year)
    .bind(week as i32)
    .bind(monday)
    .bind(week_end)
    .execute(pool)
    .await?;

    debug!(year, week, rows = result.rows_affected(), "Upserted ride weekly stats");
    Ok(result.rows_affected())
}

/// Fill `trend_vs_previous_week` on ride weekly rows for one week.
///
/// Positive means more downtime than the previous week.
pub async fn update_ride_week_trends(
    pool: &PgPool,
    target_date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let (year, week, monday) = iso_week_of(target_date);

    let result = sqlx::query(
        r"
        UPDATE ride_weekly_stats cur
        SET trend_vs_previous_week =
            ROUND((100.0 * (cur.downtime_minutes - prev.downtime_minutes)
                   / prev.downtime_minutes)::numeric, 2)::FLOAT8
        FROM ride_weekly_stats prev
        WHERE cur.year = $1 AND cur.week_number = $2
          AND prev.ride_id = cur.ride_id
          AND prev.week_start_date = $3::DATE - 7
          AND prev.downtime_minutes > 0
        ",
    )
    .bind(year)
    .bind(week as i32)
    .bind(monday)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Upsert park weekly rows from park daily rows of the same week.
pub async fn aggregate_park_weeks(
    pool: &PgPool,
    target_date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let (year, week, monday) = iso_week_of(target_date);
    let week_end = monday + chrono::Duration::days(7);

    let result = sqlx::query(
        r"
        INSERT INTO park_weekly_stats
            (park_id, year, week_number, week_start_date,
             total_rides_tracked, avg_uptime_percentage, total_downtime_hours,
             rides_with_downtime, avg_wait_time, peak_wait_time)
        SELECT
            pds.park_id,
            $1,
            $2,
            $3,
            MAX(pds.total_rides_tracked)::INT,
            ROUND(AVG(pds.avg_uptime_percentage)::numeric, 2)::FLOAT8,
            ROUND(SUM(pds.total_downtime_hours)::numeric, 2)::FLOAT8,
            MAX(pds.rides_with_downtime)::INT,
            ROUND(AVG(pds.avg_wait_time)::numeric, 2)::FLOAT8,
            MAX(pds.peak_wait_time)
        FROM park_daily_stats pds
        WHERE pds.stat_date >= $3 AND pds.stat_date < $4
        GROUP BY pds.park_id
        ON CONFLICT (park_id, year, week_number)
        DO UPDATE SET
            week_start_date = EXCLUDED.week_start_date,
            total_rides_tracked = EXCLUDED.total_rides_tracked,
            avg_uptime_percentage = EXCLUDED.avg_uptime_percentage,
            total_downtime_hours = EXCLUDED.total_downtime_hours,
            rides_with_downtime = EXCLUDED.rides_with_downtime,
            avg_wait_time = EXCLUDED.avg_wait_time,
            peak_wait_time = EXCLUDED.peak_wait_time
        ",
    )
    .bind(year)
    .bind(week as i32)
    .bind(monday)
    .bind(week_end)
    .execute(pool)
    .await?;

    debug!(year, week, rows = result.rows_affected(), "Upserted park weekly stats");
    Ok(result.rows_affected())
}

/// Fill `trend_vs_previous_week` on park weekly rows for one week.
pub async fn update_park_week_trends(
    pool: &PgPool,
    target_date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let (year, week, monday) = iso_week_of(target_date);

    let result = sqlx::query(
        r"
        UPDATE park_weekly_stats cur
        SET trend_vs_previous_week =
            ROUND((100.0 * (cur.total_downtime_hours - prev.total_downtime_hours)
                   / prev.total_downtime_hours)::numeric, 2)::FLOAT8
        FROM park_weekly_stats prev
        WHERE cur.year = $1 AND cur.week_number = $2
          AND prev.park_id = cur.park_id
          AND prev.week_start_date = $3::DATE - 7
          AND prev.total_downtime_hours > 0
        ",
    )
    .bind(year)
    .bind(week as i32)
    .bind(monday)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_math_matches_contract() {
        // Prior week 400 minutes, current 483 -> +20.75%
        let prev = 400.0_f64;
        let cur = 483.0_f64;
        let trend = 100.0 * (cur - prev) / prev;
        assert!((trend - 20.75).abs() < 0.001);
    }

    #[test]
    fn test_week_window_is_monday_to_monday() {
        let (_, _, monday) = iso_week_of(NaiveDate::from_ymd_opt(2025, 7, 30).unwrap());
        assert_eq!(monday, NaiveDate::from_ymd_opt(2025, 7, 28).unwrap());
        let week_end = monday + chrono::Duration::days(7);
        assert_eq!(week_end, NaiveDate::from_ymd_opt(2025, 8, 4).unwrap());
    }
}
