//! Trend computation.
//!
//! `trend_percentage` compares the current period's downtime against the
//! prior period of equal length. Weekly uses the trend stored during
//! aggregation; live and today compare against yesterday through the same
//! wall-clock hour; daily ranges compare against the preceding range of
//! the same length.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use parkpulse_stats::bounds::pacific_day_bounds_utc;
use parkpulse_stats::pacific_today;

use crate::today::TodayWindows;

/// Live trend per park: today's materialized downtime vs yesterday's
/// downtime through the same hour, from the hourly tables.
pub async fn live_park_trends(pool: &PgPool) -> Result<HashMap<i32, f64>, sqlx::Error> {
    let windows = TodayWindows::compute();
    let elapsed = windows.now_utc - windows.day_start_utc;

    let yesterday = pacific_today() - Duration::days(1);
    let (y_start, _) = pacific_day_bounds_utc(yesterday);
    let y_cutoff = y_start + elapsed;

    let rows: Vec<(i32, f64)> = sqlx::query_as(
        r"
        SELECT plr.park_id,
               ROUND((100.0 * (plr.total_downtime_hours - y.downtime)
                      / y.downtime)::numeric, 1)::FLOAT8
        FROM park_live_rankings plr
        JOIN (
            SELECT park_id, SUM(total_downtime_hours) AS downtime
            FROM park_hourly_stats
            WHERE hour_start_utc >= $1 AND hour_start_utc < $2
            GROUP BY park_id
        ) y ON y.park_id = plr.park_id
        WHERE y.downtime > 0
        ",
    )
    .bind(y_start)
    .bind(y_cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Yesterday's downtime per park through the same wall-clock hour as now,
/// from the hourly tables. Used to compute TODAY trends in Rust.
pub async fn yesterday_partial_downtime(
    pool: &PgPool,
) -> Result<HashMap<i32, f64>, sqlx::Error> {
    let windows = TodayWindows::compute();
    let elapsed = windows.now_utc - windows.day_start_utc;

    let yesterday = pacific_today() - Duration::days(1);
    let (y_start, _) = pacific_day_bounds_utc(yesterday);
    let y_cutoff = y_start + elapsed;

    let rows: Vec<(i32, f64)> = sqlx::query_as(
        r"
        SELECT park_id, SUM(total_downtime_hours)::FLOAT8
        FROM park_hourly_stats
        WHERE hour_start_utc >= $1 AND hour_start_utc < $2
        GROUP BY park_id
        HAVING SUM(total_downtime_hours) > 0
        ",
    )
    .bind(y_start)
    .bind(y_cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Percent change vs a baseline; `None` when the baseline is missing or zero.
#[must_use]
pub fn percent_change(current: f64, baseline: Option<f64>) -> Option<f64> {
    let baseline = baseline?;
    if baseline <= 0.0 {
        return None;
    }
    Some(((100.0 * (current - baseline) / baseline) * 10.0).round() / 10.0)
}

/// Park downtime trend between two closed date ranges of equal length,
/// from daily stats. Keys are park ids.
pub async fn park_range_trends(
    pool: &PgPool,
    cur_start: NaiveDate,
    cur_end: NaiveDate,
    prev_start: NaiveDate,
    prev_end: NaiveDate,
) -> Result<HashMap<i32, f64>, sqlx::Error> {
    let rows: Vec<(i32, f64)> = sqlx::query_as(
        r"
        SELECT cur.park_id,
               ROUND((100.0 * (cur.downtime - prev.downtime) / prev.downtime)::numeric, 1)::FLOAT8
        FROM (
            SELECT park_id, SUM(total_downtime_hours) AS downtime
            FROM park_daily_stats
            WHERE stat_date >= $1 AND stat_date <= $2
            GROUP BY park_id
        ) cur
        JOIN (
            SELECT park_id, SUM(total_downtime_hours) AS downtime
            FROM park_daily_stats
            WHERE stat_date >= $3 AND stat_date <= $4
            GROUP BY park_id
        ) prev ON prev.park_id = cur.park_id
        WHERE prev.downtime > 0
        ",
    )
    .bind(cur_start)
    .bind(cur_end)
    .bind(prev_start)
    .bind(prev_end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Ride downtime trend between two closed date ranges of equal length.
pub async fn ride_range_trends(
    pool: &PgPool,
    cur_start: NaiveDate,
    cur_end: NaiveDate,
    prev_start: NaiveDate,
    prev_end: NaiveDate,
) -> Result<HashMap<i32, f64>, sqlx::Error> {
    let rows: Vec<(i32, f64)> = sqlx::query_as(
        r"
        SELECT cur.ride_id,
               ROUND((100.0 * (cur.downtime - prev.downtime) / prev.downtime)::numeric, 1)::FLOAT8
        FROM (
            SELECT ride_id, SUM(downtime_minutes) AS downtime
            FROM ride_daily_stats
            WHERE stat_date >= $1 AND stat_date <= $2
            GROUP BY ride_id
        ) cur
        JOIN (
            SELECT ride_id, SUM(downtime_minutes) AS downtime
            FROM ride_daily_stats
            WHERE stat_date >= $3 AND stat_date <= $4
            GROUP BY ride_id
        ) prev ON prev.ride_id = cur.ride_id
        WHERE prev.downtime > 0
        ",
    )
    .bind(cur_start)
    .bind(cur_end)
    .bind(prev_start)
    .bind(prev_end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// The preceding range of the same length as `[start, end]`.
#[must_use]
pub fn previous_range(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let len = (end - start).num_days() + 1;
    (start - Duration::days(len), start - Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_previous_range_week() {
        let (prev_start, prev_end) = previous_range(d(2025, 7, 20), d(2025, 7, 26));
        assert_eq!(prev_start, d(2025, 7, 13));
        assert_eq!(prev_end, d(2025, 7, 19));
    }

    #[test]
    fn test_previous_range_single_day() {
        let (prev_start, prev_end) = previous_range(d(2025, 7, 29), d(2025, 7, 29));
        assert_eq!(prev_start, d(2025, 7, 28));
        assert_eq!(prev_end, d(2025, 7, 28));
    }
}
