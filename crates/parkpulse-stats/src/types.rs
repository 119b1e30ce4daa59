//! Stat table row types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// One (ride, UTC hour) row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RideHourlyRow {
    pub ride_id: i32,
    pub park_id: i32,
    pub hour_start_utc: DateTime<Utc>,
    pub avg_wait_time_minutes: Option<f64>,
    pub operating_snapshots: i32,
    pub down_snapshots: i32,
    pub downtime_hours: f64,
    pub uptime_percentage: Option<f64>,
    pub snapshot_count: i32,
    pub ride_operated: bool,
}

/// One (park, UTC hour) row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParkHourlyRow {
    pub park_id: i32,
    pub hour_start_utc: DateTime<Utc>,
    pub shame_score: Option<f64>,
    pub avg_wait_time_minutes: Option<f64>,
    pub rides_operating: Option<i32>,
    pub rides_down: Option<i32>,
    pub total_downtime_hours: Option<f64>,
    pub weighted_downtime_hours: Option<f64>,
    pub effective_park_weight: Option<f64>,
    pub snapshot_count: i32,
    pub park_was_open: bool,
}

/// One (ride, local date) row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RideDailyRow {
    pub ride_id: i32,
    pub stat_date: NaiveDate,
    pub uptime_minutes: i32,
    pub downtime_minutes: i32,
    pub uptime_percentage: Option<f64>,
    pub operating_hours_minutes: i32,
    pub avg_wait_time: Option<f64>,
    pub min_wait_time: Option<i32>,
    pub max_wait_time: Option<i32>,
    pub peak_wait_time: Option<i32>,
    pub status_changes: i32,
    pub longest_downtime_minutes: Option<i32>,
}

/// One (park, local date) row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParkDailyRow {
    pub park_id: i32,
    pub stat_date: NaiveDate,
    pub total_rides_tracked: i32,
    pub avg_uptime_percentage: Option<f64>,
    pub shame_score: Option<f64>,
    pub total_downtime_hours: f64,
    pub rides_with_downtime: i32,
    pub avg_wait_time: Option<f64>,
    pub peak_wait_time: Option<i32>,
    pub operating_hours_minutes: i32,
}

/// One (ride, ISO week) row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RideWeeklyRow {
    pub ride_id: i32,
    pub year: i32,
    pub week_number: i32,
    pub week_start_date: NaiveDate,
    pub uptime_minutes: i32,
    pub downtime_minutes: i32,
    pub operating_hours_minutes: i32,
    pub uptime_percentage: Option<f64>,
    pub avg_wait_time: Option<f64>,
    pub peak_wait_time: Option<i32>,
    pub status_changes: i32,
    pub trend_vs_previous_week: Option<f64>,
}

/// One (park, ISO week) row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParkWeeklyRow {
    pub park_id: i32,
    pub year: i32,
    pub week_number: i32,
    pub week_start_date: NaiveDate,
    pub total_rides_tracked: i32,
    pub avg_uptime_percentage: Option<f64>,
    pub total_downtime_hours: f64,
    pub rides_with_downtime: i32,
    pub avg_wait_time: Option<f64>,
    pub peak_wait_time: Option<i32>,
    pub trend_vs_previous_week: Option<f64>,
}
