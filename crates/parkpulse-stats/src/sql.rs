//! Centralized SQL fragments for ride status logic.
//!
//! Single source of truth mirrored on the Rust side by
//! `parkpulse_core::metrics`. Every aggregation and raw-window query uses
//! these fragments so counts always match across reports. The fragments
//! expect the aliases `rss` (ride_status_snapshots), `p` (parks), and
//! `pas` (park_activity_snapshots).

/// A snapshot counts as operating on explicit OPERATING, or on a null
/// status with `computed_is_open`.
pub const IS_OPERATING: &str =
    "(rss.status = 'OPERATING' OR (rss.status IS NULL AND rss.computed_is_open = TRUE))";

/// Park-type down rule: Disney/Universal count only DOWN; everyone else
/// also counts CLOSED and null-status-with-not-open.
pub const IS_DOWN: &str = "(CASE \
     WHEN p.is_disney = TRUE OR p.is_universal = TRUE THEN rss.status = 'DOWN' \
     ELSE (rss.status IN ('DOWN', 'CLOSED') \
           OR (rss.status IS NULL AND rss.computed_is_open = FALSE)) \
     END)";

/// Down while the park appears open; only these snapshots accrue downtime.
#[must_use]
pub fn down_while_open() -> String {
    format!("(pas.park_appears_open = TRUE AND {IS_DOWN})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_reference_expected_aliases() {
        assert!(IS_OPERATING.contains("rss.status"));
        assert!(IS_DOWN.contains("p.is_disney"));
        assert!(down_while_open().contains("pas.park_appears_open"));
    }
}
