//! Ranking queries.
//!
//! One dispatcher per endpoint, each fanning out over the five periods:
//!
//! | period     | source of truth                                   |
//! |------------|---------------------------------------------------|
//! | live       | live rankings tables                              |
//! | today      | hybrid hourly + raw tail                          |
//! | yesterday  | stored `shame_score` averages from park snapshots |
//! | last_week  | daily stats over the previous Sun-Sat Pacific week|
//! | last_month | daily stats over the previous Pacific month       |
//!
//! YESTERDAY never recomputes scores by re-joining ride snapshots to park
//! snapshots; collector timestamps can drift between sources, and the
//! stored scores are the ground truth.

use std::collections::HashMap;

use sqlx::{FromRow, PgPool};

use parkpulse_core::{ParkFilter, Period};
use parkpulse_stats::bounds::pacific_day_bounds_utc;

use crate::period::{last_month_range, last_week_range, yesterday_pacific, PeriodRange};
use crate::today::{today_park_stats, today_ride_stats};
use crate::trend::{
    live_park_trends, park_range_trends, percent_change, previous_range, ride_range_trends,
    yesterday_partial_downtime,
};
use crate::types::{
    queue_times_url, ParkDowntimeRow, ParkWaitTimeRow, RideDowntimeRow, RideWaitTimeRow,
};

/// Options shared by every ranking query.
#[derive(Debug, Clone, Copy)]
pub struct RankingOptions {
    pub period: Period,
    pub filter: ParkFilter,
    pub limit: i64,
    pub use_hourly_tables: bool,
    pub interval_minutes: i32,
    pub live_window_hours: i64,
}

fn park_filter_sql(filter: ParkFilter) -> &'static str {
    if filter.disney_universal_only() {
        "AND (p.is_disney = TRUE OR p.is_universal = TRUE)"
    } else {
        ""
    }
}

// ==================== Shared metadata helpers ====================

#[derive(Debug, Clone, FromRow)]
struct ParkMeta {
    park_id: i32,
    park_name: String,
    location: String,
}

async fn park_metadata(
    pool: &PgPool,
    filter: ParkFilter,
) -> Result<HashMap<i32, ParkMeta>, sqlx::Error> {
    let query = format!(
        r"
        SELECT p.park_id, p.name AS park_name,
               p.city || ', ' || p.state_province AS location
        FROM parks p
        WHERE p.is_active = TRUE {}
        ",
        park_filter_sql(filter)
    );
    let rows: Vec<ParkMeta> = sqlx::query_as(&query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|m| (m.park_id, m)).collect())
}

#[derive(Debug, Clone, FromRow)]
struct RideMeta {
    ride_id: i32,
    ride_name: String,
    park_id: i32,
    park_name: String,
    location: String,
    tier: Option<i32>,
    ride_queue_times_id: i64,
    park_queue_times_id: i64,
}

async fn ride_metadata(
    pool: &PgPool,
    filter: ParkFilter,
) -> Result<HashMap<i32, RideMeta>, sqlx::Error> {
    let query = format!(
        r"
        SELECT r.ride_id, r.name AS ride_name, r.park_id,
               p.name AS park_name,
               p.city || ', ' || p.state_province AS location,
               r.tier,
               r.queue_times_id AS ride_queue_times_id,
               p.queue_times_id AS park_queue_times_id
        FROM rides r
        JOIN parks p ON p.park_id = r.park_id
        WHERE r.is_active = TRUE AND p.is_active = TRUE
          AND r.category = 'ATTRACTION'
          {}
        ",
        park_filter_sql(filter)
    );
    let rows: Vec<RideMeta> = sqlx::query_as(&query).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|m| (m.ride_id, m)).collect())
}

#[derive(Debug, Clone, FromRow)]
struct RideCurrent {
    ride_id: i32,
    status: Option<String>,
    computed_is_open: bool,
    park_appears_open: Option<bool>,
}

/// Latest snapshot per ride within the live window, with the matching
/// park-open flag via the shared-`recorded_at` join.
async fn ride_current_status(
    pool: &PgPool,
    live_window_hours: i64,
) -> Result<HashMap<i32, RideCurrent>, sqlx::Error> {
    let rows: Vec<RideCurrent> = sqlx::query_as(
        r"
        SELECT DISTINCT ON (rss.ride_id)
               rss.ride_id, rss.status, rss.computed_is_open,
               pas.park_appears_open
        FROM ride_status_snapshots rss
        JOIN rides r ON r.ride_id = rss.ride_id
        LEFT JOIN park_activity_snapshots pas
            ON pas.park_id = r.park_id AND pas.recorded_at = rss.recorded_at
        WHERE rss.recorded_at >= NOW() - ($1::BIGINT * INTERVAL '1 hour')
        ORDER BY rss.ride_id, rss.recorded_at DESC
        ",
    )
    .bind(live_window_hours)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| (r.ride_id, r)).collect())
}

fn current_is_open(status: Option<&str>, computed_is_open: bool) -> Option<bool> {
    match status {
        Some("OPERATING") => Some(true),
        Some(_) => Some(false),
        None => Some(computed_is_open),
    }
}

// ==================== Park downtime ====================

/// Park downtime rankings for any period.
pub async fn park_downtime_rankings(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkDowntimeRow>> {
    match opts.period {
        Period::Live => park_downtime_live(pool, opts).await,
        Period::Today => park_downtime_today(pool, opts).await,
        Period::Yesterday => park_downtime_yesterday(pool, opts).await,
        Period::LastWeek => park_downtime_range(pool, opts, last_week_range()).await,
        Period::LastMonth => park_downtime_range(pool, opts, last_month_range()).await,
    }
}

#[derive(Debug, FromRow)]
struct ParkLiveRow {
    park_id: i32,
    park_name: String,
    location: String,
    shame_score: f64,
    total_downtime_hours: f64,
    rides_down: i32,
    total_rides: i32,
    park_is_open: bool,
}

async fn park_downtime_live(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkDowntimeRow>> {
    let filter = if opts.filter.disney_universal_only() {
        "WHERE is_disney = TRUE OR is_universal = TRUE"
    } else {
        ""
    };
    let query = format!(
        r"
        SELECT park_id, park_name, location, shame_score, total_downtime_hours,
               rides_down, total_rides, park_is_open
        FROM park_live_rankings
        {filter}
        ORDER BY shame_score DESC, total_downtime_hours DESC
        LIMIT $1
        "
    );
    let rows: Vec<ParkLiveRow> = sqlx::query_as(&query).bind(opts.limit).fetch_all(pool).await?;
    let trends = live_park_trends(pool).await.unwrap_or_default();

    Ok(rows
        .into_iter()
        .map(|r| ParkDowntimeRow {
            trend_percentage: trends.get(&r.park_id).copied(),
            park_id: r.park_id,
            park_name: r.park_name,
            location: r.location,
            shame_score: Some(r.shame_score),
            total_downtime_hours: Some(r.total_downtime_hours),
            rides_down: Some(r.rides_down),
            rides_reporting: Some(r.total_rides),
            park_is_open: Some(r.park_is_open),
            period_label: None,
        })
        .collect())
}

async fn park_downtime_today(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkDowntimeRow>> {
    let stats =
        today_park_stats(pool, opts.use_hourly_tables, opts.interval_minutes, opts.filter.disney_universal_only())
            .await?;
    let meta = park_metadata(pool, opts.filter).await?;
    let baselines = yesterday_partial_downtime(pool).await.unwrap_or_default();

    let mut rows: Vec<ParkDowntimeRow> = stats
        .into_iter()
        .filter_map(|s| {
            let m = meta.get(&s.park_id)?;
            Some(ParkDowntimeRow {
                park_id: s.park_id,
                park_name: m.park_name.clone(),
                location: m.location.clone(),
                shame_score: s.shame_score,
                total_downtime_hours: Some(s.total_downtime_hours),
                rides_down: Some(s.rides_down),
                rides_reporting: Some(s.rides_reporting),
                park_is_open: None,
                trend_percentage: percent_change(
                    s.total_downtime_hours,
                    baselines.get(&s.park_id).copied(),
                ),
                period_label: None,
            })
        })
        .collect();

    rows.truncate(opts.limit as usize);
    Ok(rows)
}

#[derive(Debug, FromRow)]
struct ParkYesterdayRow {
    park_id: i32,
    park_name: String,
    location: String,
    shame_score: Option<f64>,
    total_downtime_hours: Option<f64>,
    rides_down: Option<i32>,
    rides_reporting: Option<i32>,
}

async fn park_downtime_yesterday(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkDowntimeRow>> {
    let yesterday = yesterday_pacific();
    let (start_utc, end_utc) = pacific_day_bounds_utc(yesterday);

    // Average the STORED shame scores over open snapshots only. Joining
    // ride snapshots back to park snapshots here once produced two-park
    // result sets when collector timestamps drifted.
    let query = format!(
        r"
        SELECT p.park_id,
               p.name AS park_name,
               p.city || ', ' || p.state_province AS location,
               ROUND(AVG(pas.shame_score)::numeric, 1)::FLOAT8 AS shame_score,
               MAX(pds.total_downtime_hours)::FLOAT8 AS total_downtime_hours,
               MAX(pds.rides_with_downtime)::INT AS rides_down,
               MAX(pds.total_rides_tracked)::INT AS rides_reporting
        FROM park_activity_snapshots pas
        JOIN parks p ON p.park_id = pas.park_id
        LEFT JOIN park_daily_stats pds
            ON pds.park_id = p.park_id AND pds.stat_date = $3
        WHERE pas.recorded_at >= $1 AND pas.recorded_at < $2
          AND pas.park_appears_open = TRUE
          AND pas.shame_score IS NOT NULL
          AND p.is_active = TRUE
          {}
        GROUP BY p.park_id, p.name, p.city, p.state_province
        ORDER BY shame_score DESC NULLS LAST
        LIMIT $4
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<ParkYesterdayRow> = sqlx::query_as(&query)
        .bind(start_utc)
        .bind(end_utc)
        .bind(yesterday)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    let (prev_start, prev_end) = previous_range(yesterday, yesterday);
    let trends = park_range_trends(pool, yesterday, yesterday, prev_start, prev_end)
        .await
        .unwrap_or_default();

    Ok(rows
        .into_iter()
        .map(|r| ParkDowntimeRow {
            trend_percentage: trends.get(&r.park_id).copied(),
            park_id: r.park_id,
            park_name: r.park_name,
            location: r.location,
            shame_score: r.shame_score,
            total_downtime_hours: r.total_downtime_hours,
            rides_down: r.rides_down,
            rides_reporting: r.rides_reporting,
            park_is_open: None,
            period_label: None,
        })
        .collect())
}

async fn park_downtime_range(
    pool: &PgPool,
    opts: RankingOptions,
    range: PeriodRange,
) -> anyhow::Result<Vec<ParkDowntimeRow>> {
    let query = format!(
        r"
        SELECT p.park_id,
               p.name AS park_name,
               p.city || ', ' || p.state_province AS location,
               ROUND(AVG(pds.shame_score)::numeric, 1)::FLOAT8 AS shame_score,
               ROUND(SUM(pds.total_downtime_hours)::numeric, 2)::FLOAT8 AS total_downtime_hours,
               MAX(pds.rides_with_downtime)::INT AS rides_down,
               MAX(pds.total_rides_tracked)::INT AS rides_reporting
        FROM park_daily_stats pds
        JOIN parks p ON p.park_id = pds.park_id
        WHERE pds.stat_date >= $1 AND pds.stat_date <= $2
          AND p.is_active = TRUE
          {}
        GROUP BY p.park_id, p.name, p.city, p.state_province
        HAVING SUM(pds.total_downtime_hours) > 0 OR AVG(pds.shame_score) IS NOT NULL
        ORDER BY shame_score DESC NULLS LAST
        LIMIT $3
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<ParkYesterdayRow> = sqlx::query_as(&query)
        .bind(range.start_date)
        .bind(range.end_date)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    let (prev_start, prev_end) = previous_range(range.start_date, range.end_date);
    let trends = park_range_trends(pool, range.start_date, range.end_date, prev_start, prev_end)
        .await
        .unwrap_or_default();

    Ok(rows
        .into_iter()
        .map(|r| ParkDowntimeRow {
            trend_percentage: trends.get(&r.park_id).copied(),
            park_id: r.park_id,
            park_name: r.park_name,
            location: r.location,
            shame_score: r.shame_score,
            total_downtime_hours: r.total_downtime_hours,
            rides_down: r.rides_down,
            rides_reporting: r.rides_reporting,
            park_is_open: None,
            period_label: Some(range.label.clone()),
        })
        .collect())
}

// ==================== Park wait times ====================

/// Park wait-time rankings for any period.
pub async fn park_wait_rankings(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkWaitTimeRow>> {
    match opts.period {
        Period::Live => park_wait_live(pool, opts).await,
        Period::Today => park_wait_today(pool, opts).await,
        Period::Yesterday => {
            let yesterday = yesterday_pacific();
            park_wait_range(
                pool,
                opts,
                PeriodRange {
                    start_date: yesterday,
                    end_date: yesterday,
                    label: yesterday.format("%b %-d, %Y").to_string(),
                },
            )
            .await
        }
        Period::LastWeek => park_wait_range(pool, opts, last_week_range()).await,
        Period::LastMonth => park_wait_range(pool, opts, last_month_range()).await,
    }
}

#[derive(Debug, FromRow)]
struct ParkWaitRow {
    park_id: i32,
    park_name: String,
    location: String,
    avg_wait_minutes: Option<f64>,
    peak_wait_minutes: Option<i32>,
    rides_reporting: Option<i32>,
    park_is_open: Option<bool>,
}

async fn park_wait_live(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkWaitTimeRow>> {
    let query = format!(
        r"
        SELECT p.park_id,
               p.name AS park_name,
               p.city || ', ' || p.state_province AS location,
               ROUND(AVG(pas.avg_wait_time)::numeric, 1)::FLOAT8 AS avg_wait_minutes,
               MAX(pas.max_wait_time) AS peak_wait_minutes,
               MAX(pas.total_rides_tracked)::INT AS rides_reporting,
               BOOL_OR(pas.park_appears_open) AS park_is_open
        FROM park_activity_snapshots pas
        JOIN parks p ON p.park_id = pas.park_id
        WHERE pas.recorded_at >= NOW() - ($1::BIGINT * INTERVAL '1 hour')
          AND pas.avg_wait_time IS NOT NULL
          AND p.is_active = TRUE
          {}
        GROUP BY p.park_id, p.name, p.city, p.state_province
        ORDER BY avg_wait_minutes DESC
        LIMIT $2
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<ParkWaitRow> = sqlx::query_as(&query)
        .bind(opts.live_window_hours)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|r| park_wait_row(r, None)).collect())
}

async fn park_wait_today(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<ParkWaitTimeRow>> {
    let stats =
        today_park_stats(pool, opts.use_hourly_tables, opts.interval_minutes, opts.filter.disney_universal_only())
            .await?;
    let meta = park_metadata(pool, opts.filter).await?;

    let mut rows: Vec<ParkWaitTimeRow> = stats
        .into_iter()
        .filter_map(|s| {
            let m = meta.get(&s.park_id)?;
            s.avg_wait_minutes?;
            Some(ParkWaitTimeRow {
                park_id: s.park_id,
                park_name: m.park_name.clone(),
                location: m.location.clone(),
                avg_wait_minutes: s.avg_wait_minutes,
                peak_wait_minutes: s.peak_wait_minutes,
                rides_reporting: Some(s.rides_reporting),
                park_is_open: None,
                trend_percentage: None,
                period_label: None,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.avg_wait_minutes
            .partial_cmp(&a.avg_wait_minutes)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.truncate(opts.limit as usize);
    Ok(rows)
}

async fn park_wait_range(
    pool: &PgPool,
    opts: RankingOptions,
    range: PeriodRange,
) -> anyhow::Result<Vec<ParkWaitTimeRow>> {
    let query = format!(
        r"
        SELECT p.park_id,
               p.name AS park_name,
               p.city || ', ' || p.state_province AS location,
               ROUND(AVG(pds.avg_wait_time)::numeric, 1)::FLOAT8 AS avg_wait_minutes,
               MAX(pds.peak_wait_time) AS peak_wait_minutes,
               MAX(pds.total_rides_tracked)::INT AS rides_reporting,
               NULL::BOOLEAN AS park_is_open
        FROM park_daily_stats pds
        JOIN parks p ON p.park_id = pds.park_id
        WHERE pds.stat_date >= $1 AND pds.stat_date <= $2
          AND pds.avg_wait_time IS NOT NULL
          AND p.is_active = TRUE
          {}
        GROUP BY p.park_id, p.name, p.city, p.state_province
        ORDER BY avg_wait_minutes DESC
        LIMIT $3
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<ParkWaitRow> = sqlx::query_as(&query)
        .bind(range.start_date)
        .bind(range.end_date)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| park_wait_row(r, Some(range.label.clone())))
        .collect())
}

fn park_wait_row(r: ParkWaitRow, period_label: Option<String>) -> ParkWaitTimeRow {
    ParkWaitTimeRow {
        park_id: r.park_id,
        park_name: r.park_name,
        location: r.location,
        avg_wait_minutes: r.avg_wait_minutes,
        peak_wait_minutes: r.peak_wait_minutes,
        rides_reporting: r.rides_reporting,
        park_is_open: r.park_is_open,
        trend_percentage: None,
        period_label,
    }
}

// ==================== Ride downtime ====================

/// Ride downtime rankings for any period.
pub async fn ride_downtime_rankings(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<RideDowntimeRow>> {
    match opts.period {
        Period::Live => ride_downtime_live(pool, opts).await,
        Period::Today => ride_downtime_today(pool, opts).await,
        Period::Yesterday => {
            let yesterday = yesterday_pacific();
            ride_downtime_range(
                pool,
                opts,
                PeriodRange {
                    start_date: yesterday,
                    end_date: yesterday,
                    label: yesterday.format("%b %-d, %Y").to_string(),
                },
            )
            .await
        }
        Period::LastWeek => ride_downtime_range(pool, opts, last_week_range()).await,
        Period::LastMonth => ride_downtime_range(pool, opts, last_month_range()).await,
    }
}

#[derive(Debug, FromRow)]
struct RideLiveRow {
    ride_id: i32,
    ride_name: String,
    park_id: i32,
    park_name: String,
    tier: i32,
    downtime_hours: f64,
    downtime_incidents: i32,
    is_down: bool,
    current_status: Option<String>,
}

async fn ride_downtime_live(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<RideDowntimeRow>> {
    let filter = if opts.filter.disney_universal_only() {
        "WHERE is_disney = TRUE OR is_universal = TRUE"
    } else {
        ""
    };
    let query = format!(
        r"
        SELECT ride_id, ride_name, park_id, park_name, tier,
               downtime_hours, downtime_incidents, is_down, current_status
        FROM ride_live_rankings
        {filter}
        ORDER BY downtime_hours DESC
        LIMIT $1
        "
    );
    let rows: Vec<RideLiveRow> = sqlx::query_as(&query).bind(opts.limit).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|r| RideDowntimeRow {
            current_is_open: current_is_open(r.current_status.as_deref(), !r.is_down),
            ride_id: r.ride_id,
            ride_name: r.ride_name,
            park_id: r.park_id,
            park_name: r.park_name,
            tier: Some(r.tier),
            total_downtime_hours: Some(r.downtime_hours),
            uptime_percentage: None,
            status_changes: Some(r.downtime_incidents),
            current_status: r.current_status,
            park_is_open: None,
            trend_percentage: None,
            period_label: None,
        })
        .collect())
}

async fn ride_downtime_today(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<RideDowntimeRow>> {
    let stats = today_ride_stats(
        pool,
        opts.use_hourly_tables,
        opts.interval_minutes,
        opts.filter.disney_universal_only(),
    )
    .await?;
    let meta = ride_metadata(pool, opts.filter).await?;
    let current = ride_current_status(pool, opts.live_window_hours)
        .await
        .unwrap_or_default();

    let mut rows: Vec<RideDowntimeRow> = stats
        .into_iter()
        .filter(|s| s.total_downtime_hours > 0.0)
        .filter_map(|s| {
            let m = meta.get(&s.ride_id)?;
            let cur = current.get(&s.ride_id);
            Some(RideDowntimeRow {
                ride_id: s.ride_id,
                ride_name: m.ride_name.clone(),
                park_id: m.park_id,
                park_name: m.park_name.clone(),
                tier: m.tier,
                total_downtime_hours: Some(s.total_downtime_hours),
                uptime_percentage: None,
                status_changes: None,
                current_status: cur.and_then(|c| c.status.clone()),
                current_is_open: cur
                    .and_then(|c| current_is_open(c.status.as_deref(), c.computed_is_open)),
                park_is_open: cur.and_then(|c| c.park_appears_open),
                trend_percentage: None,
                period_label: None,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_downtime_hours
            .partial_cmp(&a.total_downtime_hours)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.truncate(opts.limit as usize);
    Ok(rows)
}

#[derive(Debug, FromRow)]
struct RideRangeRow {
    ride_id: i32,
    ride_name: String,
    park_id: i32,
    park_name: String,
    tier: Option<i32>,
    total_downtime_hours: Option<f64>,
    uptime_percentage: Option<f64>,
    status_changes: Option<i32>,
}

async fn ride_downtime_range(
    pool: &PgPool,
    opts: RankingOptions,
    range: PeriodRange,
) -> anyhow::Result<Vec<RideDowntimeRow>> {
    let query = format!(
        r"
        SELECT r.ride_id,
               r.name AS ride_name,
               r.park_id,
               p.name AS park_name,
               rc.tier,
               ROUND((SUM(rds.downtime_minutes) / 60.0)::numeric, 2)::FLOAT8
                   AS total_downtime_hours,
               ROUND(AVG(rds.uptime_percentage)::numeric, 2)::FLOAT8 AS uptime_percentage,
               SUM(rds.status_changes)::INT AS status_changes
        FROM rides r
        JOIN parks p ON p.park_id = r.park_id
        JOIN ride_daily_stats rds ON rds.ride_id = r.ride_id
        LEFT JOIN ride_classifications rc ON rc.ride_id = r.ride_id
        WHERE r.is_active = TRUE
          AND r.category = 'ATTRACTION'
          AND p.is_active = TRUE
          AND rds.stat_date >= $1 AND rds.stat_date <= $2
          {}
        GROUP BY r.ride_id, r.name, r.park_id, p.name, rc.tier
        HAVING SUM(rds.downtime_minutes) > 0
        ORDER BY total_downtime_hours DESC
        LIMIT $3
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<RideRangeRow> = sqlx::query_as(&query)
        .bind(range.start_date)
        .bind(range.end_date)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    let (prev_start, prev_end) = previous_range(range.start_date, range.end_date);
    let trends = ride_range_trends(pool, range.start_date, range.end_date, prev_start, prev_end)
        .await
        .unwrap_or_default();

    Ok(rows
        .into_iter()
        .map(|r| RideDowntimeRow {
            trend_percentage: trends.get(&r.ride_id).copied(),
            ride_id: r.ride_id,
            ride_name: r.ride_name,
            park_id: r.park_id,
            park_name: r.park_name,
            tier: r.tier,
            total_downtime_hours: r.total_downtime_hours,
            uptime_percentage: r.uptime_percentage,
            status_changes: r.status_changes,
            current_status: None,
            current_is_open: None,
            park_is_open: None,
            period_label: Some(range.label.clone()),
        })
        .collect())
}

// ==================== Ride wait times ====================

/// Ride wait-time rankings for any period.
pub async fn ride_wait_rankings(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<RideWaitTimeRow>> {
    match opts.period {
        Period::Live => ride_wait_live(pool, opts).await,
        Period::Today => ride_wait_today(pool, opts).await,
        Period::Yesterday => {
            let yesterday = yesterday_pacific();
            ride_wait_range(pool, opts, yesterday, yesterday).await
        }
        Period::LastWeek => {
            let range = last_week_range();
            ride_wait_range(pool, opts, range.start_date, range.end_date).await
        }
        Period::LastMonth => {
            let range = last_month_range();
            ride_wait_range(pool, opts, range.start_date, range.end_date).await
        }
    }
}

#[derive(Debug, FromRow)]
struct RideWaitQueryRow {
    ride_id: i32,
    avg_wait_minutes: Option<f64>,
    peak_wait_minutes: Option<i32>,
}

async fn ride_wait_live(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<RideWaitTimeRow>> {
    let query = format!(
        r"
        SELECT rss.ride_id,
               ROUND(AVG(CASE WHEN rss.wait_time > 0 THEN rss.wait_time END)::numeric, 1)::FLOAT8
                   AS avg_wait_minutes,
               MAX(rss.wait_time) AS peak_wait_minutes
        FROM ride_status_snapshots rss
        JOIN rides r ON r.ride_id = rss.ride_id
        JOIN parks p ON p.park_id = r.park_id
        WHERE rss.recorded_at >= NOW() - ($1::BIGINT * INTERVAL '1 hour')
          AND r.is_active = TRUE
          AND p.is_active = TRUE
          {}
        GROUP BY rss.ride_id
        HAVING AVG(CASE WHEN rss.wait_time > 0 THEN rss.wait_time END) IS NOT NULL
        ORDER BY avg_wait_minutes DESC
        LIMIT $2
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<RideWaitQueryRow> = sqlx::query_as(&query)
        .bind(opts.live_window_hours)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    assemble_ride_wait_rows(pool, opts, rows, true).await
}

async fn ride_wait_today(
    pool: &PgPool,
    opts: RankingOptions,
) -> anyhow::Result<Vec<RideWaitTimeRow>> {
    let stats = today_ride_stats(
        pool,
        opts.use_hourly_tables,
        opts.interval_minutes,
        opts.filter.disney_universal_only(),
    )
    .await?;

    let mut rows: Vec<RideWaitQueryRow> = stats
        .into_iter()
        .filter(|s| s.avg_wait_minutes.is_some())
        .map(|s| RideWaitQueryRow {
            ride_id: s.ride_id,
            avg_wait_minutes: s.avg_wait_minutes,
            peak_wait_minutes: s.peak_wait_minutes,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.avg_wait_minutes
            .partial_cmp(&a.avg_wait_minutes)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.truncate(opts.limit as usize);

    assemble_ride_wait_rows(pool, opts, rows, true).await
}

async fn ride_wait_range(
    pool: &PgPool,
    opts: RankingOptions,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
) -> anyhow::Result<Vec<RideWaitTimeRow>> {
    let query = format!(
        r"
        SELECT rds.ride_id,
               ROUND(AVG(rds.avg_wait_time)::numeric, 1)::FLOAT8 AS avg_wait_minutes,
               MAX(rds.peak_wait_time) AS peak_wait_minutes
        FROM ride_daily_stats rds
        JOIN rides r ON r.ride_id = rds.ride_id
        JOIN parks p ON p.park_id = r.park_id
        WHERE rds.stat_date >= $1 AND rds.stat_date <= $2
          AND rds.avg_wait_time IS NOT NULL
          AND r.is_active = TRUE
          AND p.is_active = TRUE
          {}
        GROUP BY rds.ride_id
        ORDER BY avg_wait_minutes DESC
        LIMIT $3
        ",
        park_filter_sql(opts.filter)
    );

    let rows: Vec<RideWaitQueryRow> = sqlx::query_as(&query)
        .bind(start_date)
        .bind(end_date)
        .bind(opts.limit)
        .fetch_all(pool)
        .await?;

    assemble_ride_wait_rows(pool, opts, rows, false).await
}

/// Attach metadata and (for live/today) current state to wait rows.
async fn assemble_ride_wait_rows(
    pool: &PgPool,
    opts: RankingOptions,
    rows: Vec<RideWaitQueryRow>,
    include_current: bool,
) -> anyhow::Result<Vec<RideWaitTimeRow>> {
    let meta = ride_metadata(pool, opts.filter).await?;
    let current = if include_current {
        ride_current_status(pool, opts.live_window_hours)
            .await
            .unwrap_or_default()
    } else {
        HashMap::new()
    };

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let m = meta.get(&r.ride_id)?;
            let cur = current.get(&r.ride_id);
            Some(RideWaitTimeRow {
                ride_id: r.ride_id,
                ride_name: m.ride_name.clone(),
                park_id: m.park_id,
                park_name: m.park_name.clone(),
                location: m.location.clone(),
                avg_wait_minutes: r.avg_wait_minutes,
                peak_wait_minutes: r.peak_wait_minutes,
                current_status: cur.and_then(|c| c.status.clone()),
                current_is_open: cur
                    .and_then(|c| current_is_open(c.status.as_deref(), c.computed_is_open)),
                park_is_open: cur.and_then(|c| c.park_appears_open),
                tier: m.tier,
                trend_percentage: None,
                queue_times_url: queue_times_url(m.park_queue_times_id, m.ride_queue_times_id),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_open_mapping() {
        assert_eq!(current_is_open(Some("OPERATING"), false), Some(true));
        assert_eq!(current_is_open(Some("DOWN"), true), Some(false));
        assert_eq!(current_is_open(Some("CLOSED"), true), Some(false));
        // Null status defers to the computed flag
        assert_eq!(current_is_open(None, true), Some(true));
        assert_eq!(current_is_open(None, false), Some(false));
    }

    #[test]
    fn test_park_filter_sql() {
        assert_eq!(park_filter_sql(ParkFilter::AllParks), "");
        assert!(park_filter_sql(ParkFilter::DisneyUniversal).contains("is_disney"));
    }
}
