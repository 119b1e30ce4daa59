//! Ride status, category, and data source enums.

use serde::{Deserialize, Serialize};

/// Operational status of a ride as reported upstream.
///
/// Queue-Times data carries no explicit status (`None` at the snapshot
/// level); the wiki source reports one of the four variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    /// Ride is running and accepting guests
    Operating,
    /// Unscheduled breakdown
    Down,
    /// Scheduled closure (park hours, weather)
    Closed,
    /// Long-term refurbishment
    Refurbishment,
}

impl RideStatus {
    /// Convert from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPERATING" => Some(Self::Operating),
            "DOWN" => Some(Self::Down),
            "CLOSED" => Some(Self::Closed),
            "REFURBISHMENT" => Some(Self::Refurbishment),
            _ => None,
        }
    }

    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Operating => "OPERATING",
            Self::Down => "DOWN",
            Self::Closed => "CLOSED",
            Self::Refurbishment => "REFURBISHMENT",
        }
    }

    /// Derive `computed_is_open` from an explicit status.
    #[must_use]
    pub const fn implies_open(&self) -> bool {
        matches!(self, Self::Operating)
    }
}

/// Entity category from the wiki source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideCategory {
    Attraction,
    Show,
    MeetAndGreet,
    Experience,
}

impl RideCategory {
    /// Convert from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ATTRACTION" => Some(Self::Attraction),
            "SHOW" => Some(Self::Show),
            "MEET_AND_GREET" => Some(Self::MeetAndGreet),
            "EXPERIENCE" => Some(Self::Experience),
            _ => None,
        }
    }

    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attraction => "ATTRACTION",
            Self::Show => "SHOW",
            Self::MeetAndGreet => "MEET_AND_GREET",
            Self::Experience => "EXPERIENCE",
        }
    }
}

/// Provenance tag on raw snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    /// Written by the live collection cycle
    Live,
    /// Backfilled from the historical archive
    Archive,
}

impl DataSource {
    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "LIVE",
            Self::Archive => "ARCHIVE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_status_round_trip() {
        for status in [
            RideStatus::Operating,
            RideStatus::Down,
            RideStatus::Closed,
            RideStatus::Refurbishment,
        ] {
            assert_eq!(RideStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_is_none() {
        assert_eq!(RideStatus::parse("WALKING_AROUND"), None);
        assert_eq!(RideStatus::parse(""), None);
    }

    #[test]
    fn test_only_operating_implies_open() {
        assert!(RideStatus::Operating.implies_open());
        assert!(!RideStatus::Down.implies_open());
        assert!(!RideStatus::Closed.implies_open());
        assert!(!RideStatus::Refurbishment.implies_open());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            RideCategory::parse("MEET_AND_GREET"),
            Some(RideCategory::MeetAndGreet)
        );
        assert_eq!(RideCategory::parse("RESTAURANT"), None);
    }
}
