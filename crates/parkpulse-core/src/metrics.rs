//! Core metric math shared by the collector, aggregator, and query layer.
//!
//! Single source of truth for the shame score, tier weights, and the
//! park-type down rule. If a rule changes, change it here and every report
//! stays consistent.

/// Default collection cadence in minutes.
pub const DEFAULT_SNAPSHOT_INTERVAL_MINUTES: i32 = 10;

/// Default lookback window for "live" queries, in hours.
pub const DEFAULT_LIVE_WINDOW_HOURS: i64 = 2;

/// Rides with no operation in this many days drop out of live rankings.
pub const DORMANT_RIDE_DAYS: i64 = 7;

/// Tier weight table: tier 1 rides weigh 3, tier 2 weigh 2, tier 3 weigh 1.
/// Unclassified rides default to weight 2.
#[must_use]
pub const fn tier_weight(tier: Option<i32>) -> i32 {
    match tier {
        Some(1) => 3,
        Some(3) => 1,
        _ => 2,
    }
}

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Shame score on a 0.0-10.0 scale, one decimal.
///
/// `weighted_down` is the sum of tier weights of currently-down rides;
/// `total_weight` is the sum of tier weights of the park's active rides.
/// Returns `None` when the park has no weighted rides, so callers never
/// write a score for an empty portfolio.
#[must_use]
pub fn shame_score(weighted_down: f64, total_weight: f64) -> Option<f64> {
    if total_weight <= 0.0 {
        return None;
    }
    let raw = 10.0 * (weighted_down / total_weight);
    Some(round1(raw.clamp(0.0, 10.0)))
}

/// Park-type down rule.
///
/// Disney/Universal parks count a ride as down only on explicit `DOWN`.
/// All other parks also count `CLOSED`, and a null status paired with
/// `computed_is_open = false`.
#[must_use]
pub fn is_down_for_park(
    disney_or_universal: bool,
    status: Option<&str>,
    computed_is_open: bool,
) -> bool {
    if disney_or_universal {
        return status == Some("DOWN");
    }
    match status {
        Some("DOWN") | Some("CLOSED") => true,
        None => !computed_is_open,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_weight_table() {
        assert_eq!(tier_weight(Some(1)), 3);
        assert_eq!(tier_weight(Some(2)), 2);
        assert_eq!(tier_weight(Some(3)), 1);
        assert_eq!(tier_weight(None), 2);
        // Out-of-range tiers fall back to the default weight
        assert_eq!(tier_weight(Some(7)), 2);
    }

    #[test]
    fn test_shame_score_worked_example() {
        // Three active rides: tier 1 (weight 3) down, tier 2 (weight 2) and
        // tier 3 (weight 1) operating. 10 * 3/6 = 5.0.
        assert_eq!(shame_score(3.0, 6.0), Some(5.0));
    }

    #[test]
    fn test_shame_score_bounds() {
        assert_eq!(shame_score(0.0, 6.0), Some(0.0));
        assert_eq!(shame_score(6.0, 6.0), Some(10.0));
        // Clamped even if the inputs are inconsistent
        assert_eq!(shame_score(9.0, 6.0), Some(10.0));
    }

    #[test]
    fn test_shame_score_one_decimal() {
        // 10 * 1/3 = 3.333... -> 3.3
        assert_eq!(shame_score(1.0, 3.0), Some(3.3));
        // 10 * 2/3 = 6.666... -> 6.7
        assert_eq!(shame_score(2.0, 3.0), Some(6.7));
    }

    #[test]
    fn test_shame_score_empty_portfolio() {
        assert_eq!(shame_score(0.0, 0.0), None);
        assert_eq!(shame_score(1.0, -1.0), None);
    }

    #[test]
    fn test_down_rule_disney() {
        // Disney/Universal: only DOWN counts
        assert!(is_down_for_park(true, Some("DOWN"), false));
        assert!(!is_down_for_park(true, Some("CLOSED"), false));
        assert!(!is_down_for_park(true, None, false));
        assert!(!is_down_for_park(true, Some("OPERATING"), true));
    }

    #[test]
    fn test_down_rule_other_parks() {
        // Other parks: DOWN, CLOSED, and null-with-not-open all count
        assert!(is_down_for_park(false, Some("DOWN"), false));
        assert!(is_down_for_park(false, Some("CLOSED"), true));
        assert!(is_down_for_park(false, None, false));
        assert!(!is_down_for_park(false, None, true));
        assert!(!is_down_for_park(false, Some("OPERATING"), true));
        assert!(!is_down_for_park(false, Some("REFURBISHMENT"), false));
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(5.04), 5.0);
        assert_eq!(round1(5.05), 5.1);
        assert_eq!(round1(12.75), 12.8);
    }
}
