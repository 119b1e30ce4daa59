//! Ranking response row types.
//!
//! The field names here are the public API contract: `avg_wait_minutes`
//! (never `avg_wait_time`), `peak_wait_minutes`, `rides_reporting`,
//! `trend_percentage`, `tier`, `current_is_open`, `current_status`,
//! `park_is_open`. Missing values serialize as explicit nulls; nothing is
//! skipped, so every row carries the same keys.

use serde::Serialize;

/// One park in a downtime ranking.
#[derive(Debug, Clone, Serialize)]
pub struct ParkDowntimeRow {
    pub park_id: i32,
    pub park_name: String,
    pub location: String,
    pub shame_score: Option<f64>,
    pub total_downtime_hours: Option<f64>,
    pub rides_down: Option<i32>,
    pub rides_reporting: Option<i32>,
    pub park_is_open: Option<bool>,
    pub trend_percentage: Option<f64>,
    pub period_label: Option<String>,
}

/// One park in a wait-time ranking.
#[derive(Debug, Clone, Serialize)]
pub struct ParkWaitTimeRow {
    pub park_id: i32,
    pub park_name: String,
    pub location: String,
    pub avg_wait_minutes: Option<f64>,
    pub peak_wait_minutes: Option<i32>,
    pub rides_reporting: Option<i32>,
    pub park_is_open: Option<bool>,
    pub trend_percentage: Option<f64>,
    pub period_label: Option<String>,
}

/// One ride in a downtime ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RideDowntimeRow {
    pub ride_id: i32,
    pub ride_name: String,
    pub park_id: i32,
    pub park_name: String,
    pub tier: Option<i32>,
    pub total_downtime_hours: Option<f64>,
    pub uptime_percentage: Option<f64>,
    pub status_changes: Option<i32>,
    pub current_status: Option<String>,
    pub current_is_open: Option<bool>,
    pub park_is_open: Option<bool>,
    pub trend_percentage: Option<f64>,
    pub period_label: Option<String>,
}

/// One ride in a wait-time ranking.
///
/// Exactly these keys, in the public contract.
#[derive(Debug, Clone, Serialize)]
pub struct RideWaitTimeRow {
    pub ride_id: i32,
    pub ride_name: String,
    pub park_id: i32,
    pub park_name: String,
    pub location: String,
    pub avg_wait_minutes: Option<f64>,
    pub peak_wait_minutes: Option<i32>,
    pub current_status: Option<String>,
    pub current_is_open: Option<bool>,
    pub park_is_open: Option<bool>,
    pub tier: Option<i32>,
    pub trend_percentage: Option<f64>,
    pub queue_times_url: Option<String>,
}

/// Queue-Times page for a ride, for outbound links.
#[must_use]
pub fn queue_times_url(park_queue_times_id: i64, ride_queue_times_id: i64) -> Option<String> {
    if park_queue_times_id <= 0 || ride_queue_times_id <= 0 {
        // Generated ids (negative) have no upstream page
        return None;
    }
    Some(format!(
        "https://queue-times.com/parks/{park_queue_times_id}/rides/{ride_queue_times_id}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_wait_row_field_contract() {
        let row = RideWaitTimeRow {
            ride_id: 1,
            ride_name: "Space Mountain".into(),
            park_id: 2,
            park_name: "Magic Kingdom".into(),
            location: "Orlando, FL".into(),
            avg_wait_minutes: Some(42.5),
            peak_wait_minutes: None,
            current_status: Some("OPERATING".into()),
            current_is_open: Some(true),
            park_is_open: Some(true),
            tier: Some(1),
            trend_percentage: None,
            queue_times_url: queue_times_url(6, 284),
        };

        let value = serde_json::to_value(&row).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "avg_wait_minutes",
                "current_is_open",
                "current_status",
                "location",
                "park_id",
                "park_is_open",
                "park_name",
                "peak_wait_minutes",
                "queue_times_url",
                "ride_id",
                "ride_name",
                "tier",
                "trend_percentage",
            ]
        );

        // Missing values serialize as null, never dropped
        assert!(object["peak_wait_minutes"].is_null());
        assert!(object["trend_percentage"].is_null());
    }

    #[test]
    fn test_queue_times_url_for_generated_ids() {
        assert!(queue_times_url(6, 284).is_some());
        assert_eq!(queue_times_url(6, -12345), None);
    }

    #[test]
    fn test_park_row_nulls_preserved() {
        let row = ParkDowntimeRow {
            park_id: 1,
            park_name: "Kennywood".into(),
            location: "West Mifflin, PA".into(),
            shame_score: None,
            total_downtime_hours: Some(3.2),
            rides_down: None,
            rides_reporting: Some(21),
            park_is_open: None,
            trend_percentage: None,
            period_label: Some("Jul 20-26, 2025".into()),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value["shame_score"].is_null());
        assert!(value["rides_down"].is_null());
        assert_eq!(value["rides_reporting"], 21);
    }
}
