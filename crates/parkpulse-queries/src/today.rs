//! The hybrid TODAY query.
//!
//! Completed hours come from the hourly stat tables; the in-progress hour
//! comes from raw snapshots aggregated with the same logic the hourly job
//! uses. Just after midnight the hourly side is empty and the combiner is
//! the identity on the raw side. With `use_hourly_tables` off, the raw
//! path serves the entire day.

use std::collections::HashMap;

use chrono::{DateTime, DurationRound, Utc};
use sqlx::{FromRow, PgPool};

use parkpulse_core::metrics::round1;
use parkpulse_stats::bounds::{pacific_day_bounds_utc, PACIFIC};
use parkpulse_stats::raw_window::{park_window_stats, ParkWindowStats};

/// The three boundaries of the hybrid query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodayWindows {
    /// Pacific midnight, in UTC
    pub day_start_utc: DateTime<Utc>,
    /// Floor of the current hour, in UTC
    pub current_hour_start_utc: DateTime<Utc>,
    pub now_utc: DateTime<Utc>,
}

impl TodayWindows {
    /// Compute the windows for the current instant.
    #[must_use]
    pub fn compute() -> Self {
        Self::compute_at(Utc::now())
    }

    /// Compute the windows for a given instant.
    #[must_use]
    pub fn compute_at(now_utc: DateTime<Utc>) -> Self {
        let today_pacific = now_utc.with_timezone(&PACIFIC).date_naive();
        let (day_start_utc, _) = pacific_day_bounds_utc(today_pacific);
        let current_hour_start_utc = now_utc
            .duration_trunc(chrono::Duration::hours(1))
            .unwrap_or(now_utc);

        Self {
            day_start_utc,
            current_hour_start_utc,
            now_utc,
        }
    }

    /// True when no hour has completed yet today (just after midnight).
    #[must_use]
    pub fn no_complete_hours(&self) -> bool {
        self.current_hour_start_utc <= self.day_start_utc
    }
}

/// Combined per-park TODAY stats.
#[derive(Debug, Clone, PartialEq)]
pub struct TodayParkStats {
    pub park_id: i32,
    pub shame_score: Option<f64>,
    pub total_downtime_hours: f64,
    pub rides_down: i32,
    pub snapshot_count: i32,
    pub rides_reporting: i32,
    pub avg_wait_minutes: Option<f64>,
    pub peak_wait_minutes: Option<i32>,
}

/// Hourly-side per-park aggregate over the completed hours.
#[derive(Debug, Clone, FromRow)]
pub struct HourlyParkSide {
    pub park_id: i32,
    pub shame_score: Option<f64>,
    pub total_downtime_hours: f64,
    pub rides_down: i32,
    pub snapshot_count: i32,
    pub rides_reporting: i32,
    pub avg_wait_minutes: Option<f64>,
}

/// Query the hourly tables for the completed-hours window.
pub async fn query_hourly_tables(
    pool: &PgPool,
    windows: TodayWindows,
    disney_universal_only: bool,
) -> Result<Vec<HourlyParkSide>, sqlx::Error> {
    let filter = if disney_universal_only {
        "AND (p.is_disney = TRUE OR p.is_universal = TRUE)"
    } else {
        ""
    };

    let query = format!(
        r"
        SELECT
            ph.park_id,
            CASE WHEN SUM(ph.snapshot_count)
                        FILTER (WHERE ph.park_was_open AND ph.shame_score IS NOT NULL) > 0
                 THEN ROUND((SUM(ph.shame_score * ph.snapshot_count)
                                FILTER (WHERE ph.park_was_open AND ph.shame_score IS NOT NULL)
                             / SUM(ph.snapshot_count)
                                FILTER (WHERE ph.park_was_open AND ph.shame_score IS NOT NULL)
                            )::numeric, 1)::FLOAT8
                 END AS shame_score,
            COALESCE(SUM(ph.total_downtime_hours), 0)::FLOAT8 AS total_downtime_hours,
            COALESCE(MAX(ph.rides_down), 0)::INT AS rides_down,
            COALESCE(SUM(ph.snapshot_count), 0)::INT AS snapshot_count,
            COALESCE(MAX(ph.rides_operating), 0)::INT AS rides_reporting,
            ROUND((SUM(ph.avg_wait_time_minutes * ph.snapshot_count)
                      FILTER (WHERE ph.avg_wait_time_minutes IS NOT NULL)
                   / NULLIF(SUM(ph.snapshot_count)
                      FILTER (WHERE ph.avg_wait_time_minutes IS NOT NULL), 0)
                  )::numeric, 1)::FLOAT8 AS avg_wait_minutes
        FROM park_hourly_stats ph
        JOIN parks p ON p.park_id = ph.park_id
        WHERE ph.hour_start_utc >= $1 AND ph.hour_start_utc < $2
          AND p.is_active = TRUE
          {filter}
        GROUP BY ph.park_id
        "
    );

    sqlx::query_as::<_, HourlyParkSide>(&query)
        .bind(windows.day_start_utc)
        .bind(windows.current_hour_start_utc)
        .fetch_all(pool)
        .await
}

/// Whole-day peak wait per park from raw park snapshots.
async fn query_day_peaks(
    pool: &PgPool,
    windows: TodayWindows,
) -> Result<HashMap<i32, i32>, sqlx::Error> {
    let rows: Vec<(i32, Option<i32>)> = sqlx::query_as(
        r"
        SELECT park_id, MAX(max_wait_time)
        FROM park_activity_snapshots
        WHERE recorded_at >= $1 AND recorded_at <= $2
        GROUP BY park_id
        ",
    )
    .bind(windows.day_start_utc)
    .bind(windows.now_utc)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(park_id, peak)| peak.map(|p| (park_id, p)))
        .collect())
}

/// Merge the hourly side with the raw current-hour side.
///
/// Downtime sums, shame averages weighted by snapshot count, `rides_down`
/// takes the conservative max, other counts sum. A park present on only
/// one side passes through unchanged.
#[must_use]
pub fn combine_park_today(
    hourly: &[HourlyParkSide],
    raw: &[ParkWindowStats],
) -> Vec<TodayParkStats> {
    let raw_by_park: HashMap<i32, &ParkWindowStats> =
        raw.iter().map(|r| (r.park_id, r)).collect();

    let mut combined: HashMap<i32, TodayParkStats> = HashMap::new();

    for h in hourly {
        let mut stats = TodayParkStats {
            park_id: h.park_id,
            shame_score: h.shame_score,
            total_downtime_hours: h.total_downtime_hours,
            rides_down: h.rides_down,
            snapshot_count: h.snapshot_count,
            rides_reporting: h.rides_reporting,
            avg_wait_minutes: h.avg_wait_minutes,
            peak_wait_minutes: None,
        };

        if let Some(r) = raw_by_park.get(&h.park_id) {
            stats.total_downtime_hours = h.total_downtime_hours + r.total_downtime_hours;
            stats.shame_score = weighted_shame(
                h.shame_score,
                h.snapshot_count,
                r.shame_score,
                r.snapshot_count,
            );
            stats.rides_down = h.rides_down.max(r.rides_down);
            stats.snapshot_count = h.snapshot_count + r.snapshot_count;
            stats.rides_reporting = h.rides_reporting.max(r.rides_reporting);
            stats.avg_wait_minutes = stats.avg_wait_minutes.or(r.avg_wait_time);
            stats.peak_wait_minutes = r.peak_wait_time;
        }

        combined.insert(h.park_id, stats);
    }

    // Parks only seen in the raw tail (e.g. first hour of the day)
    for r in raw {
        combined.entry(r.park_id).or_insert_with(|| TodayParkStats {
            park_id: r.park_id,
            shame_score: r.shame_score,
            total_downtime_hours: r.total_downtime_hours,
            rides_down: r.rides_down,
            snapshot_count: r.snapshot_count,
            rides_reporting: r.rides_reporting,
            avg_wait_minutes: r.avg_wait_time,
            peak_wait_minutes: r.peak_wait_time,
        });
    }

    let mut rows: Vec<TodayParkStats> = combined.into_values().collect();
    rows.sort_by(|a, b| {
        b.shame_score
            .unwrap_or(0.0)
            .partial_cmp(&a.shame_score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

fn weighted_shame(
    hourly_shame: Option<f64>,
    hourly_count: i32,
    raw_shame: Option<f64>,
    raw_count: i32,
) -> Option<f64> {
    match (hourly_shame, raw_shame) {
        (Some(h), Some(r)) => {
            let total = hourly_count + raw_count;
            if total <= 0 {
                return None;
            }
            Some(round1(
                (h * f64::from(hourly_count) + r * f64::from(raw_count)) / f64::from(total),
            ))
        }
        (Some(h), None) => Some(h),
        (None, Some(r)) => Some(r),
        (None, None) => None,
    }
}

/// Full TODAY stats per park.
///
/// With `use_hourly_tables` the completed hours come from the hourly
/// tables and only the current hour is computed raw; otherwise the raw
/// path covers the whole day.
pub async fn today_park_stats(
    pool: &PgPool,
    use_hourly_tables: bool,
    interval_minutes: i32,
    disney_universal_only: bool,
) -> anyhow::Result<Vec<TodayParkStats>> {
    let windows = TodayWindows::compute();

    let mut rows = if use_hourly_tables && !windows.no_complete_hours() {
        let hourly = query_hourly_tables(pool, windows, disney_universal_only).await?;
        let raw = park_window_stats(
            pool,
            windows.current_hour_start_utc,
            windows.now_utc,
            interval_minutes,
            disney_universal_only,
        )
        .await?;
        combine_park_today(&hourly, &raw)
    } else {
        let raw = park_window_stats(
            pool,
            windows.day_start_utc,
            windows.now_utc,
            interval_minutes,
            disney_universal_only,
        )
        .await?;
        combine_park_today(&[], &raw)
    };

    // Fill whole-day peaks; the hourly tables do not carry them
    let peaks = query_day_peaks(pool, windows).await?;
    for row in &mut rows {
        if row.peak_wait_minutes.is_none() {
            row.peak_wait_minutes = peaks.get(&row.park_id).copied();
        }
    }

    Ok(rows)
}

// ==================== Ride side ====================

/// Combined per-ride TODAY stats.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TodayRideStats {
    pub ride_id: i32,
    pub avg_wait_minutes: Option<f64>,
    pub peak_wait_minutes: Option<i32>,
    pub total_downtime_hours: f64,
    pub snapshot_count: i32,
}

/// Per-ride TODAY stats via the same hybrid strategy.
pub async fn today_ride_stats(
    pool: &PgPool,
    use_hourly_tables: bool,
    interval_minutes: i32,
    disney_universal_only: bool,
) -> anyhow::Result<Vec<TodayRideStats>> {
    let windows = TodayWindows::compute();
    let filter = if disney_universal_only {
        "AND (p.is_disney = TRUE OR p.is_universal = TRUE)"
    } else {
        ""
    };

    let raw_start = if use_hourly_tables && !windows.no_complete_hours() {
        windows.current_hour_start_utc
    } else {
        windows.day_start_utc
    };

    // Raw tail (or whole day when the hourly tables are off)
    let raw_query = format!(
        r"
        SELECT
            rss.ride_id,
            ROUND(AVG(CASE WHEN rss.wait_time > 0 THEN rss.wait_time END)::numeric, 1)::FLOAT8
                AS avg_wait_minutes,
            MAX(rss.wait_time) AS peak_wait_minutes,
            ROUND((SUM(CASE WHEN pas.park_appears_open = TRUE AND {is_down}
                           THEN 1 ELSE 0 END) * $3::FLOAT8 / 60.0)::numeric, 2)::FLOAT8
                AS total_downtime_hours,
            COUNT(*)::INT AS snapshot_count
        FROM ride_status_snapshots rss
        JOIN rides r ON r.ride_id = rss.ride_id
        JOIN parks p ON p.park_id = r.park_id
        LEFT JOIN park_activity_snapshots pas
            ON pas.park_id = r.park_id AND pas.recorded_at = rss.recorded_at
        WHERE rss.recorded_at >= $1 AND rss.recorded_at <= $2
          AND r.is_active = TRUE AND p.is_active = TRUE
          {filter}
        GROUP BY rss.ride_id
        ",
        is_down = parkpulse_stats::sql::IS_DOWN,
    );
    let raw: Vec<TodayRideStats> = sqlx::query_as(&raw_query)
        .bind(raw_start)
        .bind(windows.now_utc)
        .bind(interval_minutes)
        .fetch_all(pool)
        .await?;

    if !(use_hourly_tables && !windows.no_complete_hours()) {
        return Ok(raw);
    }

    // Completed hours from the hourly tables
    let hourly_query = format!(
        r"
        SELECT
            rh.ride_id,
            ROUND((SUM(rh.avg_wait_time_minutes * rh.snapshot_count)
                      FILTER (WHERE rh.avg_wait_time_minutes IS NOT NULL)
                   / NULLIF(SUM(rh.snapshot_count)
                      FILTER (WHERE rh.avg_wait_time_minutes IS NOT NULL), 0)
                  )::numeric, 1)::FLOAT8 AS avg_wait_minutes,
            NULL::INT AS peak_wait_minutes,
            COALESCE(SUM(rh.downtime_hours), 0)::FLOAT8 AS total_downtime_hours,
            COALESCE(SUM(rh.snapshot_count), 0)::INT AS snapshot_count
        FROM ride_hourly_stats rh
        JOIN rides r ON r.ride_id = rh.ride_id
        JOIN parks p ON p.park_id = r.park_id
        WHERE rh.hour_start_utc >= $1 AND rh.hour_start_utc < $2
          AND r.is_active = TRUE AND p.is_active = TRUE
          {filter}
        GROUP BY rh.ride_id
        "
    );
    let hourly: Vec<TodayRideStats> = sqlx::query_as(&hourly_query)
        .bind(windows.day_start_utc)
        .bind(windows.current_hour_start_utc)
        .fetch_all(pool)
        .await?;

    Ok(combine_ride_today(&hourly, &raw))
}

/// Merge hourly and raw ride sides: downtime sums, waits weighted by
/// snapshot count, peak takes the max of the two windows.
#[must_use]
pub fn combine_ride_today(
    hourly: &[TodayRideStats],
    raw: &[TodayRideStats],
) -> Vec<TodayRideStats> {
    let raw_by_ride: HashMap<i32, &TodayRideStats> =
        raw.iter().map(|r| (r.ride_id, r)).collect();

    let mut combined: HashMap<i32, TodayRideStats> = HashMap::new();

    for h in hourly {
        let mut stats = h.clone();
        if let Some(r) = raw_by_ride.get(&h.ride_id) {
            stats.total_downtime_hours = h.total_downtime_hours + r.total_downtime_hours;
            stats.avg_wait_minutes = weighted_wait(
                h.avg_wait_minutes,
                h.snapshot_count,
                r.avg_wait_minutes,
                r.snapshot_count,
            );
            stats.peak_wait_minutes = match (h.peak_wait_minutes, r.peak_wait_minutes) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            stats.snapshot_count = h.snapshot_count + r.snapshot_count;
        }
        combined.insert(h.ride_id, stats);
    }

    for r in raw {
        combined.entry(r.ride_id).or_insert_with(|| r.clone());
    }

    combined.into_values().collect()
}

fn weighted_wait(
    hourly_wait: Option<f64>,
    hourly_count: i32,
    raw_wait: Option<f64>,
    raw_count: i32,
) -> Option<f64> {
    match (hourly_wait, raw_wait) {
        (Some(h), Some(r)) => {
            let total = hourly_count + raw_count;
            if total <= 0 {
                return None;
            }
            Some(round1(
                (h * f64::from(hourly_count) + r * f64::from(raw_count)) / f64::from(total),
            ))
        }
        (h, r) => h.or(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly(park_id: i32, shame: Option<f64>, downtime: f64, down: i32, count: i32) -> HourlyParkSide {
        HourlyParkSide {
            park_id,
            shame_score: shame,
            total_downtime_hours: downtime,
            rides_down: down,
            snapshot_count: count,
            rides_reporting: 20,
            avg_wait_minutes: Some(30.0),
        }
    }

    fn raw(park_id: i32, shame: Option<f64>, downtime: f64, down: i32, count: i32) -> ParkWindowStats {
        ParkWindowStats {
            park_id,
            shame_score: shame,
            total_downtime_hours: downtime,
            rides_down: down,
            snapshot_count: count,
            rides_reporting: 18,
            avg_wait_time: Some(35.0),
            peak_wait_time: Some(90),
        }
    }

    #[test]
    fn test_windows_at_0945_pacific() {
        // 09:45 PDT on 2025-07-30 = 16:45 UTC
        let now = Utc.with_ymd_and_hms(2025, 7, 30, 16, 45, 0).unwrap();
        let windows = TodayWindows::compute_at(now);

        // Pacific midnight = 07:00 UTC in July
        assert_eq!(windows.day_start_utc.to_rfc3339(), "2025-07-30T07:00:00+00:00");
        assert_eq!(
            windows.current_hour_start_utc.to_rfc3339(),
            "2025-07-30T16:00:00+00:00"
        );
        assert!(!windows.no_complete_hours());
    }

    #[test]
    fn test_windows_just_after_midnight() {
        // 00:15 PDT = 07:15 UTC; the current hour began before Pacific
        // midnight, so there are no complete hours yet
        let now = Utc.with_ymd_and_hms(2025, 7, 30, 7, 15, 0).unwrap();
        let windows = TodayWindows::compute_at(now);
        assert!(windows.no_complete_hours());
    }

    #[test]
    fn test_combine_downtime_sums() {
        // 8 completed hours with 12.5h downtime; 3 down snapshots at
        // 5-minute cadence in the current hour = 0.25h. Expected 12.75.
        let combined = combine_park_today(
            &[hourly(16, Some(6.0), 12.5, 5, 96)],
            &[raw(16, Some(7.5), 0.25, 3, 9)],
        );
        assert_eq!(combined.len(), 1);
        assert!((combined[0].total_downtime_hours - 12.75).abs() < 1e-9);
    }

    #[test]
    fn test_combine_shame_weighted_by_snapshots() {
        // (6.0*96 + 7.5*9) / 105 = 6.128... -> 6.1
        let combined = combine_park_today(
            &[hourly(16, Some(6.0), 12.5, 5, 96)],
            &[raw(16, Some(7.5), 0.25, 3, 9)],
        );
        assert_eq!(combined[0].shame_score, Some(6.1));
    }

    #[test]
    fn test_combine_rides_down_takes_max() {
        let combined = combine_park_today(
            &[hourly(16, Some(6.0), 12.5, 5, 96)],
            &[raw(16, Some(7.5), 0.25, 3, 9)],
        );
        // Conservative: max(5, 3), not 5 + 3
        assert_eq!(combined[0].rides_down, 5);

        let combined = combine_park_today(
            &[hourly(16, Some(6.0), 12.5, 2, 96)],
            &[raw(16, Some(7.5), 0.25, 4, 9)],
        );
        assert_eq!(combined[0].rides_down, 4);
    }

    #[test]
    fn test_combine_identity_when_raw_empty() {
        // Zero snapshots in the current hour: the hourly side passes
        // through untouched
        let combined = combine_park_today(&[hourly(16, Some(6.0), 12.5, 5, 96)], &[]);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].shame_score, Some(6.0));
        assert!((combined[0].total_downtime_hours - 12.5).abs() < 1e-9);
        assert_eq!(combined[0].snapshot_count, 96);
    }

    #[test]
    fn test_combine_raw_only_park_passes_through() {
        // A park with no completed-hour rows yet still appears
        let combined = combine_park_today(&[], &[raw(7, Some(2.0), 0.1, 1, 4)]);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].park_id, 7);
        assert_eq!(combined[0].shame_score, Some(2.0));
    }

    #[test]
    fn test_combine_sorts_by_shame_desc() {
        let combined = combine_park_today(
            &[
                hourly(1, Some(2.0), 1.0, 1, 10),
                hourly(2, Some(8.0), 4.0, 3, 10),
                hourly(3, None, 0.0, 0, 10),
            ],
            &[],
        );
        assert_eq!(combined[0].park_id, 2);
        assert_eq!(combined[1].park_id, 1);
        assert_eq!(combined[2].park_id, 3);
    }

    #[test]
    fn test_snapshot_counts_sum() {
        let combined = combine_park_today(
            &[hourly(16, Some(6.0), 12.5, 5, 96)],
            &[raw(16, Some(7.5), 0.25, 3, 9)],
        );
        assert_eq!(combined[0].snapshot_count, 105);
    }

    fn ride_stats(ride_id: i32, wait: Option<f64>, peak: Option<i32>, down: f64, count: i32) -> TodayRideStats {
        TodayRideStats {
            ride_id,
            avg_wait_minutes: wait,
            peak_wait_minutes: peak,
            total_downtime_hours: down,
            snapshot_count: count,
        }
    }

    #[test]
    fn test_combine_ride_wait_weighted() {
        // (40*90 + 60*10) / 100 = 42.0
        let combined = combine_ride_today(
            &[ride_stats(1, Some(40.0), None, 1.0, 90)],
            &[ride_stats(1, Some(60.0), Some(75), 0.25, 10)],
        );
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].avg_wait_minutes, Some(42.0));
        assert!((combined[0].total_downtime_hours - 1.25).abs() < 1e-9);
        assert_eq!(combined[0].peak_wait_minutes, Some(75));
    }

    #[test]
    fn test_combine_ride_hourly_only() {
        let combined = combine_ride_today(&[ride_stats(2, Some(20.0), None, 0.5, 60)], &[]);
        assert_eq!(combined[0].avg_wait_minutes, Some(20.0));
        assert!((combined[0].total_downtime_hours - 0.5).abs() < 1e-9);
    }
}
