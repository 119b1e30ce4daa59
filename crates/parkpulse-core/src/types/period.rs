//! Ranking period and park filter enums.
//!
//! Every ranking endpoint accepts the same five periods; parsing failures
//! surface as 400s at the API boundary.

use serde::{Deserialize, Serialize};

/// The five canonical ranking periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Current state from the live rankings tables
    Live,
    /// Hybrid of completed hourly aggregates plus the raw current hour
    Today,
    /// Previous Pacific calendar day from stored snapshot scores
    Yesterday,
    /// Previous complete Sunday-Saturday week in Pacific time
    LastWeek,
    /// Previous complete calendar month in Pacific time
    LastMonth,
}

impl Period {
    /// Parse a query-string period value.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "live" => Ok(Self::Live),
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "last_week" => Ok(Self::LastWeek),
            "last_month" => Ok(Self::LastMonth),
            other => Err(format!(
                "invalid period '{other}' (expected live, today, yesterday, last_week, last_month)"
            )),
        }
    }

    /// Convert to the query-string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::LastWeek => "last_week",
            Self::LastMonth => "last_month",
        }
    }
}

/// Park scope filter for ranking queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParkFilter {
    /// All tracked parks
    #[default]
    AllParks,
    /// Disney and Universal parks only
    DisneyUniversal,
}

impl ParkFilter {
    /// Parse a query-string filter value.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "all-parks" => Ok(Self::AllParks),
            "disney-universal" => Ok(Self::DisneyUniversal),
            other => Err(format!(
                "invalid filter '{other}' (expected all-parks or disney-universal)"
            )),
        }
    }

    /// Whether the filter restricts to Disney/Universal parks.
    #[must_use]
    pub const fn disney_universal_only(&self) -> bool {
        matches!(self, Self::DisneyUniversal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_periods() {
        assert_eq!(Period::parse("live"), Ok(Period::Live));
        assert_eq!(Period::parse("today"), Ok(Period::Today));
        assert_eq!(Period::parse("yesterday"), Ok(Period::Yesterday));
        assert_eq!(Period::parse("last_week"), Ok(Period::LastWeek));
        assert_eq!(Period::parse("last_month"), Ok(Period::LastMonth));
    }

    #[test]
    fn test_parse_invalid_period() {
        assert!(Period::parse("this_week").is_err());
        assert!(Period::parse("LIVE").is_err());
        assert!(Period::parse("").is_err());
    }

    #[test]
    fn test_period_round_trip() {
        for period in [
            Period::Live,
            Period::Today,
            Period::Yesterday,
            Period::LastWeek,
            Period::LastMonth,
        ] {
            assert_eq!(Period::parse(period.as_str()), Ok(period));
        }
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(ParkFilter::parse("all-parks"), Ok(ParkFilter::AllParks));
        assert_eq!(
            ParkFilter::parse("disney-universal"),
            Ok(ParkFilter::DisneyUniversal)
        );
        assert!(ParkFilter::parse("disney").is_err());
    }
}
