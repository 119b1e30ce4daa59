//! Chart queries in Chart.js shape.
//!
//! Every chart returns `{labels, datasets}`. Hourly charts label the 18
//! hours `"6:00"` through `"23:00"` in Pacific time; daily charts label
//! days as `"Mon DD"`. A dataset value is `null` wherever data is absent;
//! zero is never substituted, because a zero is a real measurement.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Timelike};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use parkpulse_core::ParkFilter;
use parkpulse_stats::bounds::{pacific_day_bounds_utc, pacific_today, PACIFIC};

/// First labeled hour of hourly charts (6am local).
const HOURLY_CHART_START: u32 = 6;

/// One dataset line.
#[derive(Debug, Clone, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub entity_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub park_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i32>,
    pub data: Vec<Option<f64>>,
}

/// Chart.js-shaped response.
#[derive(Debug, Clone, Serialize)]
pub struct ChartResponse {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    pub chart_type: String,
    pub granularity: String,
}

/// Hour labels `"6:00"` .. `"23:00"`.
#[must_use]
pub fn hourly_labels() -> Vec<String> {
    (HOURLY_CHART_START..24).map(|h| format!("{h}:00")).collect()
}

/// Daily labels `"Mon DD"` over a closed date range.
fn daily_labels_between(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut labels = Vec::new();
    let mut current = start;
    while current <= end {
        labels.push(current.format("%b %d").to_string());
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    labels
}

fn park_filter_sql(filter: ParkFilter) -> &'static str {
    if filter.disney_universal_only() {
        "AND (p.is_disney = TRUE OR p.is_universal = TRUE)"
    } else {
        ""
    }
}

// ==================== Ride wait history, daily ====================

#[derive(Debug, FromRow)]
struct RideDailyPoint {
    ride_id: i32,
    ride_name: String,
    park_name: String,
    tier: Option<i32>,
    stat_date: NaiveDate,
    avg_wait_time: Option<f64>,
}

/// Daily wait-time history for the top rides over the last `days` days.
pub async fn ride_wait_daily(
    pool: &PgPool,
    days: i64,
    filter: ParkFilter,
    limit: i64,
) -> anyhow::Result<ChartResponse> {
    let end = pacific_today() - Duration::days(1);
    let start = end - Duration::days(days - 1);
    ride_wait_daily_between(pool, start, end, filter, limit).await
}

/// Daily wait-time history over an explicit closed date range.
pub async fn ride_wait_daily_between(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
    filter: ParkFilter,
    limit: i64,
) -> anyhow::Result<ChartResponse> {
    let labels = daily_labels_between(start, end);

    let query = format!(
        r"
        WITH top_rides AS (
            SELECT rds.ride_id
            FROM ride_daily_stats rds
            JOIN rides r ON r.ride_id = rds.ride_id
            JOIN parks p ON p.park_id = r.park_id
            WHERE rds.stat_date >= $1 AND rds.stat_date <= $2
              AND rds.avg_wait_time IS NOT NULL
              AND r.is_active = TRUE AND p.is_active = TRUE
              {filter}
            GROUP BY rds.ride_id
            ORDER BY AVG(rds.avg_wait_time) DESC
            LIMIT $3
        )
        SELECT r.ride_id, r.name AS ride_name, p.name AS park_name,
               rc.tier, rds.stat_date,
               ROUND(rds.avg_wait_time::numeric, 1)::FLOAT8 AS avg_wait_time
        FROM ride_daily_stats rds
        JOIN top_rides t ON t.ride_id = rds.ride_id
        JOIN rides r ON r.ride_id = rds.ride_id
        JOIN parks p ON p.park_id = r.park_id
        LEFT JOIN ride_classifications rc ON rc.ride_id = r.ride_id
        WHERE rds.stat_date >= $1 AND rds.stat_date <= $2
        ORDER BY r.ride_id, rds.stat_date
        ",
        filter = park_filter_sql(filter)
    );

    let points: Vec<RideDailyPoint> = sqlx::query_as(&query)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut datasets: Vec<ChartDataset> = Vec::new();
    let mut by_ride: HashMap<i32, (String, String, Option<i32>, HashMap<String, f64>)> =
        HashMap::new();

    for point in points {
        let entry = by_ride.entry(point.ride_id).or_insert_with(|| {
            (
                point.ride_name.clone(),
                point.park_name.clone(),
                point.tier,
                HashMap::new(),
            )
        });
        if let Some(wait) = point.avg_wait_time {
            entry
                .3
                .insert(point.stat_date.format("%b %d").to_string(), wait);
        }
    }

    for (ride_id, (ride_name, park_name, tier, by_date)) in by_ride {
        // Align to labels; dates with no row stay null
        let data = labels.iter().map(|label| by_date.get(label).copied()).collect();
        datasets.push(ChartDataset {
            label: ride_name,
            entity_id: ride_id,
            park_name: Some(park_name),
            tier,
            data,
        });
    }
    datasets.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(ChartResponse {
        labels,
        datasets,
        chart_type: "ride_waittimes".to_string(),
        granularity: "daily".to_string(),
    })
}

// ==================== Park shame history, daily ====================

#[derive(Debug, FromRow)]
struct ParkDailyPoint {
    park_id: i32,
    park_name: String,
    stat_date: NaiveDate,
    shame_score: Option<f64>,
}

/// Daily shame-score history for the top parks over a closed date range.
pub async fn park_shame_daily(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
    filter: ParkFilter,
    limit: i64,
) -> anyhow::Result<ChartResponse> {
    let labels = daily_labels_between(start, end);

    let query = format!(
        r"
        WITH top_parks AS (
            SELECT pds.park_id
            FROM park_daily_stats pds
            JOIN parks p ON p.park_id = pds.park_id
            WHERE pds.stat_date >= $1 AND pds.stat_date <= $2
              AND pds.shame_score IS NOT NULL
              AND p.is_active = TRUE
              {filter}
            GROUP BY pds.park_id
            ORDER BY AVG(pds.shame_score) DESC
            LIMIT $3
        )
        SELECT p.park_id, p.name AS park_name, pds.stat_date,
               ROUND(pds.shame_score::numeric, 1)::FLOAT8 AS shame_score
        FROM park_daily_stats pds
        JOIN top_parks t ON t.park_id = pds.park_id
        JOIN parks p ON p.park_id = pds.park_id
        WHERE pds.stat_date >= $1 AND pds.stat_date <= $2
        ORDER BY p.park_id, pds.stat_date
        ",
        filter = park_filter_sql(filter)
    );

    let points: Vec<ParkDailyPoint> = sqlx::query_as(&query)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut by_park: HashMap<i32, (String, HashMap<String, f64>)> = HashMap::new();
    for point in points {
        let entry = by_park
            .entry(point.park_id)
            .or_insert_with(|| (point.park_name.clone(), HashMap::new()));
        if let Some(score) = point.shame_score {
            entry
                .1
                .insert(point.stat_date.format("%b %d").to_string(), score);
        }
    }

    let mut datasets: Vec<ChartDataset> = by_park
        .into_iter()
        .map(|(park_id, (park_name, by_date))| ChartDataset {
            label: park_name,
            entity_id: park_id,
            park_name: None,
            tier: None,
            data: labels.iter().map(|label| by_date.get(label).copied()).collect(),
        })
        .collect();
    datasets.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(ChartResponse {
        labels,
        datasets,
        chart_type: "park_shame".to_string(),
        granularity: "daily".to_string(),
    })
}

// ==================== Ride wait history, hourly (today) ====================

#[derive(Debug, FromRow)]
struct RideHourlyPoint {
    ride_id: i32,
    ride_name: String,
    park_name: String,
    tier: Option<i32>,
    hour_start_utc: chrono::DateTime<chrono::Utc>,
    avg_wait_time_minutes: Option<f64>,
}

/// Hourly wait-time history for today's top rides.
pub async fn ride_wait_hourly(
    pool: &PgPool,
    filter: ParkFilter,
    limit: i64,
) -> anyhow::Result<ChartResponse> {
    let labels = hourly_labels();
    let (day_start, day_end) = pacific_day_bounds_utc(pacific_today());

    let query = format!(
        r"
        WITH top_rides AS (
            SELECT rh.ride_id
            FROM ride_hourly_stats rh
            JOIN rides r ON r.ride_id = rh.ride_id
            JOIN parks p ON p.park_id = r.park_id
            WHERE rh.hour_start_utc >= $1 AND rh.hour_start_utc < $2
              AND rh.avg_wait_time_minutes IS NOT NULL
              AND r.is_active = TRUE AND p.is_active = TRUE
              {filter}
            GROUP BY rh.ride_id
            ORDER BY AVG(rh.avg_wait_time_minutes) DESC
            LIMIT $3
        )
        SELECT r.ride_id, r.name AS ride_name, p.name AS park_name,
               rc.tier, rh.hour_start_utc, rh.avg_wait_time_minutes
        FROM ride_hourly_stats rh
        JOIN top_rides t ON t.ride_id = rh.ride_id
        JOIN rides r ON r.ride_id = rh.ride_id
        JOIN parks p ON p.park_id = r.park_id
        LEFT JOIN ride_classifications rc ON rc.ride_id = r.ride_id
        WHERE rh.hour_start_utc >= $1 AND rh.hour_start_utc < $2
        ORDER BY r.ride_id, rh.hour_start_utc
        ",
        filter = park_filter_sql(filter)
    );

    let points: Vec<RideHourlyPoint> = sqlx::query_as(&query)
        .bind(day_start)
        .bind(day_end)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut by_ride: HashMap<i32, (String, String, Option<i32>, HashMap<String, f64>)> =
        HashMap::new();
    for point in points {
        let entry = by_ride.entry(point.ride_id).or_insert_with(|| {
            (
                point.ride_name.clone(),
                point.park_name.clone(),
                point.tier,
                HashMap::new(),
            )
        });
        if let Some(wait) = point.avg_wait_time_minutes {
            let local_hour = point.hour_start_utc.with_timezone(&PACIFIC).hour();
            entry.3.insert(format!("{local_hour}:00"), wait);
        }
    }

    let mut datasets: Vec<ChartDataset> = by_ride
        .into_iter()
        .map(|(ride_id, (ride_name, park_name, tier, by_hour))| ChartDataset {
            label: ride_name,
            entity_id: ride_id,
            park_name: Some(park_name),
            tier,
            data: labels.iter().map(|label| by_hour.get(label).copied()).collect(),
        })
        .collect();
    datasets.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(ChartResponse {
        labels,
        datasets,
        chart_type: "ride_waittimes".to_string(),
        granularity: "hourly".to_string(),
    })
}

// ==================== Park shame history, hourly (today) ====================

#[derive(Debug, FromRow)]
struct ParkHourlyPoint {
    park_id: i32,
    park_name: String,
    hour_start_utc: chrono::DateTime<chrono::Utc>,
    shame_score: Option<f64>,
}

/// Hourly shame-score history for today's parks.
///
/// With `use_hourly_tables` off the raw snapshot path serves the whole
/// day; both paths produce the same labels and alignment.
pub async fn park_shame_hourly(
    pool: &PgPool,
    filter: ParkFilter,
    limit: i64,
    use_hourly_tables: bool,
) -> anyhow::Result<ChartResponse> {
    let labels = hourly_labels();
    let (day_start, day_end) = pacific_day_bounds_utc(pacific_today());

    let query = if use_hourly_tables {
        format!(
            r"
            WITH top_parks AS (
                SELECT ph.park_id
                FROM park_hourly_stats ph
                JOIN parks p ON p.park_id = ph.park_id
                WHERE ph.hour_start_utc >= $1 AND ph.hour_start_utc < $2
                  AND ph.shame_score IS NOT NULL
                  AND p.is_active = TRUE
                  {filter}
                GROUP BY ph.park_id
                ORDER BY AVG(ph.shame_score) DESC
                LIMIT $3
            )
            SELECT p.park_id, p.name AS park_name, ph.hour_start_utc, ph.shame_score
            FROM park_hourly_stats ph
            JOIN top_parks t ON t.park_id = ph.park_id
            JOIN parks p ON p.park_id = ph.park_id
            WHERE ph.hour_start_utc >= $1 AND ph.hour_start_utc < $2
            ORDER BY p.park_id, ph.hour_start_utc
            ",
            filter = park_filter_sql(filter)
        )
    } else {
        format!(
            r"
            WITH hourly AS (
                SELECT pas.park_id,
                       date_trunc('hour', pas.recorded_at) AS hour_start_utc,
                       ROUND(AVG(CASE WHEN pas.park_appears_open = TRUE
                                      THEN pas.shame_score END)::numeric, 1)::FLOAT8
                           AS shame_score
                FROM park_activity_snapshots pas
                WHERE pas.recorded_at >= $1 AND pas.recorded_at < $2
                GROUP BY pas.park_id, date_trunc('hour', pas.recorded_at)
            ),
            top_parks AS (
                SELECT h.park_id
                FROM hourly h
                JOIN parks p ON p.park_id = h.park_id
                WHERE h.shame_score IS NOT NULL AND p.is_active = TRUE {filter}
                GROUP BY h.park_id
                ORDER BY AVG(h.shame_score) DESC
                LIMIT $3
            )
            SELECT p.park_id, p.name AS park_name, h.hour_start_utc, h.shame_score
            FROM hourly h
            JOIN top_parks t ON t.park_id = h.park_id
            JOIN parks p ON p.park_id = h.park_id
            ORDER BY p.park_id, h.hour_start_utc
            ",
            filter = park_filter_sql(filter)
        )
    };

    let points: Vec<ParkHourlyPoint> = sqlx::query_as(&query)
        .bind(day_start)
        .bind(day_end)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut by_park: HashMap<i32, (String, HashMap<String, f64>)> = HashMap::new();
    for point in points {
        let entry = by_park
            .entry(point.park_id)
            .or_insert_with(|| (point.park_name.clone(), HashMap::new()));
        if let Some(score) = point.shame_score {
            let local_hour = point.hour_start_utc.with_timezone(&PACIFIC).hour();
            entry.1.insert(format!("{local_hour}:00"), score);
        }
    }

    let mut datasets: Vec<ChartDataset> = by_park
        .into_iter()
        .map(|(park_id, (park_name, by_hour))| ChartDataset {
            label: park_name,
            entity_id: park_id,
            park_name: None,
            tier: None,
            data: labels.iter().map(|label| by_hour.get(label).copied()).collect(),
        })
        .collect();
    datasets.sort_by(|a, b| a.label.cmp(&b.label));

    Ok(ChartResponse {
        labels,
        datasets,
        chart_type: "park_shame".to_string(),
        granularity: "hourly".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_labels_are_18_hours() {
        let labels = hourly_labels();
        assert_eq!(labels.len(), 18);
        assert_eq!(labels.first().map(String::as_str), Some("6:00"));
        assert_eq!(labels.last().map(String::as_str), Some("23:00"));
    }

    #[test]
    fn test_daily_labels_format() {
        let labels = daily_labels_between(
            NaiveDate::from_ymd_opt(2025, 7, 30).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
        );
        assert_eq!(labels, vec!["Jul 30", "Jul 31", "Aug 01", "Aug 02"]);
    }

    #[test]
    fn test_missing_cells_stay_null() {
        // Alignment logic: a label with no data point maps to None
        let labels = hourly_labels();
        let mut by_hour = HashMap::new();
        by_hour.insert("9:00".to_string(), 5.5_f64);
        by_hour.insert("10:00".to_string(), 6.0_f64);

        let data: Vec<Option<f64>> =
            labels.iter().map(|label| by_hour.get(label).copied()).collect();

        assert_eq!(data[0], None); // 6:00
        assert_eq!(data[3], Some(5.5)); // 9:00
        assert_eq!(data[4], Some(6.0)); // 10:00
        assert_eq!(data[17], None); // 23:00
        assert_eq!(data.iter().filter(|d| d.is_some()).count(), 2);
    }
}
