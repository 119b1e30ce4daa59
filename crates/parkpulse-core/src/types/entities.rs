//! Database row types shared across crates.
//!
//! SQL result rows are decoded into these immediately at the data-access
//! boundary; no crate passes raw rows around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked theme park.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Park {
    pub park_id: i32,
    /// Queue-Times numeric id
    pub queue_times_id: i64,
    /// ThemeParks.wiki destination/park UUID, once reconciled
    pub wiki_entity_id: Option<String>,
    pub name: String,
    pub city: String,
    pub state_province: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA timezone name (e.g. "America/New_York")
    pub timezone: String,
    pub operator: String,
    pub is_disney: bool,
    pub is_universal: bool,
    pub is_active: bool,
}

impl Park {
    /// Disney and Universal parks follow the stricter down rule.
    #[must_use]
    pub const fn is_disney_or_universal(&self) -> bool {
        self.is_disney || self.is_universal
    }
}

/// A tracked ride.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ride {
    pub ride_id: i32,
    pub park_id: i32,
    pub queue_times_id: i64,
    pub wiki_entity_id: Option<String>,
    pub name: String,
    pub land_area: Option<String>,
    /// ATTRACTION / SHOW / MEET_AND_GREET / EXPERIENCE
    pub category: String,
    /// Denormalized tier; must match the classification row
    pub tier: Option<i32>,
    pub last_operated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Tier classification record for a ride.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RideClassification {
    pub ride_id: i32,
    pub tier: i32,
    pub tier_weight: i32,
    /// manual_override / cached_match / pattern / ai
    pub method: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
    /// JSON-encoded array of research source URLs
    pub sources: Option<String>,
    pub classified_at: DateTime<Utc>,
}

/// Park-level activity snapshot, one per park per collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParkActivitySnapshot {
    pub park_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub total_rides_tracked: i32,
    pub rides_open: i32,
    pub rides_closed: i32,
    pub avg_wait_time: Option<f64>,
    pub max_wait_time: Option<i32>,
    pub park_appears_open: bool,
    /// 0.0-10.0, one decimal; null whenever the park appears closed
    pub shame_score: Option<f64>,
}

/// Ride-level status snapshot, one per ride per collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RideStatusSnapshot {
    pub ride_id: i32,
    pub recorded_at: DateTime<Utc>,
    /// Explicit upstream status; null for sources without one
    pub status: Option<String>,
    pub computed_is_open: bool,
    pub wait_time: Option<i32>,
    /// LIVE or ARCHIVE
    pub data_source: String,
}

/// Normalized upstream record produced by every source adapter.
///
/// No component outside `parkpulse-upstream` may depend on vendor field
/// names; this is the only shape that crosses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamSnapshot {
    /// Source-native park identifier (numeric id or UUID as text)
    pub external_park_id: String,
    /// Source-native ride identifier, when the source has one
    pub external_ride_id: Option<String>,
    pub ride_name: String,
    pub timestamp: DateTime<Utc>,
    /// Explicit status string, when the source reports one
    pub status: Option<String>,
    pub wait_time_minutes: Option<i32>,
    /// Source-level hint that the ride/park is open
    pub park_open_hint: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disney_or_universal_flag() {
        let mut park = Park {
            park_id: 1,
            queue_times_id: 10,
            wiki_entity_id: None,
            name: "Magic Kingdom".into(),
            city: "Orlando".into(),
            state_province: "FL".into(),
            country: "US".into(),
            latitude: Some(28.417),
            longitude: Some(-81.581),
            timezone: "America/New_York".into(),
            operator: "Disney".into(),
            is_disney: true,
            is_universal: false,
            is_active: true,
        };
        assert!(park.is_disney_or_universal());

        park.is_disney = false;
        assert!(!park.is_disney_or_universal());

        park.is_universal = true;
        assert!(park.is_disney_or_universal());
    }
}
