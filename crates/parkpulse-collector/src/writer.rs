//! Snapshot writer.
//!
//! Persists one park's collection cycle: every ride snapshot, the detected
//! status transitions, and the park activity snapshot, all sharing one
//! `recorded_at` and one transaction. The shared timestamp is the join key
//! used by aggregation and the live materializer.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use parkpulse_core::metrics::{is_down_for_park, shame_score, tier_weight};
use parkpulse_core::types::Park;
use parkpulse_core::{DataSource, RideStatus};

/// One resolved upstream record, ready to persist.
#[derive(Debug, Clone)]
pub struct ResolvedRide {
    pub ride_id: i32,
    pub tier: Option<i32>,
    /// Explicit upstream status, when the source has one
    pub status: Option<String>,
    /// Source-level open hint, used when status is absent
    pub open_hint: Option<bool>,
    pub wait_time: Option<i32>,
}

impl ResolvedRide {
    /// Derive `computed_is_open`.
    ///
    /// Explicit statuses win: OPERATING is open, DOWN/CLOSED/REFURBISHMENT
    /// are not. A null status falls back to the source's open hint.
    #[must_use]
    pub fn computed_is_open(&self) -> bool {
        match self.status.as_deref() {
            Some(s) => RideStatus::parse(s).is_some_and(|status| status.implies_open()),
            None => self.open_hint.unwrap_or(false),
        }
    }

    /// Effective status string for the change log.
    fn effective_status(&self) -> &str {
        match self.status.as_deref() {
            Some(s) => s,
            None if self.computed_is_open() => "OPERATING",
            None => "DOWN",
        }
    }
}

/// Derived park-level numbers for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkCycleStats {
    pub rides_tracked: i32,
    pub rides_open: i32,
    pub rides_closed: i32,
    pub avg_wait_time: Option<f64>,
    pub max_wait_time: Option<i32>,
    pub park_appears_open: bool,
    pub shame_score: Option<f64>,
}

/// Summary returned to the cycle runner.
#[derive(Debug, Clone)]
pub struct ParkCycleSummary {
    pub park_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub stats: ParkCycleStats,
    pub status_changes: usize,
}

/// Compute the per-park stats for one cycle.
///
/// `schedule_open` is the external schedule hint; the heuristic is
/// "at least `min_open_rides` rides open this cycle".
#[must_use]
pub fn compute_park_stats(
    park_is_disney_universal: bool,
    rides: &[ResolvedRide],
    schedule_open: Option<bool>,
    min_open_rides: i32,
) -> ParkCycleStats {
    let rides_tracked = rides.len() as i32;
    let rides_open = rides.iter().filter(|r| r.computed_is_open()).count() as i32;
    let rides_closed = rides_tracked - rides_open;

    let open_waits: Vec<i32> = rides
        .iter()
        .filter(|r| r.computed_is_open())
        .filter_map(|r| r.wait_time)
        .filter(|w| *w >= 0)
        .collect();
    let avg_wait_time = if open_waits.is_empty() {
        None
    } else {
        Some(f64::from(open_waits.iter().sum::<i32>()) / open_waits.len() as f64)
    };
    let max_wait_time = open_waits.iter().max().copied();

    let park_appears_open = rides_open >= min_open_rides || schedule_open == Some(true);

    // Weighted down ratio over the park's active portfolio
    let total_weight: f64 = rides.iter().map(|r| f64::from(tier_weight(r.tier))).sum();
    let weighted_down: f64 = rides
        .iter()
        .filter(|r| {
            is_down_for_park(
                park_is_disney_universal,
                r.status.as_deref(),
                r.computed_is_open(),
            )
        })
        .map(|r| f64::from(tier_weight(r.tier)))
        .sum();

    // A score is written only while the park appears open
    let shame = if park_appears_open {
        shame_score(weighted_down, total_weight)
    } else {
        None
    };

    ParkCycleStats {
        rides_tracked,
        rides_open,
        rides_closed,
        avg_wait_time,
        max_wait_time,
        park_appears_open,
        shame_score: shame,
    }
}

/// Persist one park's cycle.
///
/// All rows share `recorded_at`; the whole cycle is one transaction and
/// either persists fully or not at all.
pub async fn write_park_cycle(
    pool: &PgPool,
    park: &Park,
    rides: &[ResolvedRide],
    recorded_at: DateTime<Utc>,
    schedule_open: Option<bool>,
    min_open_rides: i32,
    data_source: DataSource,
) -> Result<ParkCycleSummary, sqlx::Error> {
    let stats = compute_park_stats(
        park.is_disney_or_universal(),
        rides,
        schedule_open,
        min_open_rides,
    );

    let mut tx = pool.begin().await?;

    // Previous status per ride, for transition detection
    let ride_ids: Vec<i32> = rides.iter().map(|r| r.ride_id).collect();
    let previous: Vec<(i32, bool)> = sqlx::query_as(
        r"
        SELECT DISTINCT ON (ride_id) ride_id, computed_is_open
        FROM ride_status_snapshots
        WHERE ride_id = ANY($1)
        ORDER BY ride_id, recorded_at DESC
        ",
    )
    .bind(&ride_ids)
    .fetch_all(&mut *tx)
    .await?;
    let previous: std::collections::HashMap<i32, bool> = previous.into_iter().collect();

    let mut status_changes = 0usize;
    let mut operated_now: Vec<i32> = Vec::new();

    for ride in rides {
        let is_open = ride.computed_is_open();

        sqlx::query(
            r"
            INSERT INTO ride_status_snapshots
                (ride_id, recorded_at, status, computed_is_open, wait_time, data_source)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(ride.ride_id)
        .bind(recorded_at)
        .bind(&ride.status)
        .bind(is_open)
        .bind(ride.wait_time)
        .bind(data_source.as_str())
        .execute(&mut *tx)
        .await?;

        if is_open {
            operated_now.push(ride.ride_id);
        }

        if let Some(was_open) = previous.get(&ride.ride_id) {
            if *was_open != is_open {
                record_status_change(&mut tx, ride, recorded_at, is_open).await?;
                status_changes += 1;
            }
        }
    }

    if !operated_now.is_empty() {
        sqlx::query("UPDATE rides SET last_operated_at = $2 WHERE ride_id = ANY($1)")
            .bind(&operated_now)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        r"
        INSERT INTO park_activity_snapshots
            (park_id, recorded_at, total_rides_tracked, rides_open, rides_closed,
             avg_wait_time, max_wait_time, park_appears_open, shame_score)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(park.park_id)
    .bind(recorded_at)
    .bind(stats.rides_tracked)
    .bind(stats.rides_open)
    .bind(stats.rides_closed)
    .bind(stats.avg_wait_time)
    .bind(stats.max_wait_time)
    .bind(stats.park_appears_open)
    .bind(stats.shame_score)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(
        park_id = park.park_id,
        rides = rides.len(),
        rides_open = stats.rides_open,
        shame = ?stats.shame_score,
        status_changes,
        "Wrote park cycle"
    );

    Ok(ParkCycleSummary {
        park_id: park.park_id,
        recorded_at,
        stats,
        status_changes,
    })
}

/// Append a status-change row, closing the open downtime interval when a
/// ride recovers.
async fn record_status_change(
    tx: &mut Transaction<'_, Postgres>,
    ride: &ResolvedRide,
    recorded_at: DateTime<Utc>,
    now_open: bool,
) -> Result<(), sqlx::Error> {
    let downtime_minutes: Option<i32> = if now_open {
        // Recovering: measure back to the transition that started the outage
        let last: Option<(DateTime<Utc>, String)> = sqlx::query_as(
            r"
            SELECT changed_at, to_status FROM ride_status_changes
            WHERE ride_id = $1
            ORDER BY changed_at DESC
            LIMIT 1
            ",
        )
        .bind(ride.ride_id)
        .fetch_optional(&mut **tx)
        .await?;

        last.and_then(|(changed_at, to_status)| {
            if to_status == "OPERATING" {
                None
            } else {
                Some((recorded_at - changed_at).num_minutes() as i32)
            }
        })
    } else {
        None
    };

    let (from_status, to_status) = if now_open {
        ("DOWN", ride.effective_status())
    } else {
        ("OPERATING", ride.effective_status())
    };

    sqlx::query(
        r"
        INSERT INTO ride_status_changes
            (ride_id, changed_at, from_status, to_status, downtime_duration_minutes)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(ride.ride_id)
    .bind(recorded_at)
    .bind(from_status)
    .bind(to_status)
    .bind(downtime_minutes)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride(ride_id: i32, tier: i32, status: &str, wait: Option<i32>) -> ResolvedRide {
        ResolvedRide {
            ride_id,
            tier: Some(tier),
            status: Some(status.to_string()),
            open_hint: None,
            wait_time: wait,
        }
    }

    #[test]
    fn test_computed_is_open_from_status() {
        assert!(ride(1, 2, "OPERATING", None).computed_is_open());
        assert!(!ride(1, 2, "DOWN", None).computed_is_open());
        assert!(!ride(1, 2, "CLOSED", None).computed_is_open());
        assert!(!ride(1, 2, "REFURBISHMENT", None).computed_is_open());
    }

    #[test]
    fn test_computed_is_open_falls_back_to_hint() {
        let open = ResolvedRide {
            ride_id: 1,
            tier: None,
            status: None,
            open_hint: Some(true),
            wait_time: Some(20),
        };
        assert!(open.computed_is_open());

        let unknown = ResolvedRide {
            ride_id: 1,
            tier: None,
            status: None,
            open_hint: None,
            wait_time: None,
        };
        assert!(!unknown.computed_is_open());
    }

    #[test]
    fn test_shame_score_worked_example() {
        // R1 tier 1 (weight 3) DOWN, R2 tier 2 (weight 2) OPERATING,
        // R3 tier 3 (weight 1) OPERATING -> 10 * 3/6 = 5.0
        let rides = vec![
            ride(1, 1, "DOWN", None),
            ride(2, 2, "OPERATING", Some(30)),
            ride(3, 3, "OPERATING", Some(10)),
        ];
        let stats = compute_park_stats(true, &rides, Some(true), 3);
        assert!(stats.park_appears_open);
        assert_eq!(stats.shame_score, Some(5.0));
        assert_eq!(stats.rides_open, 2);
        assert_eq!(stats.rides_closed, 1);
    }

    #[test]
    fn test_park_type_down_rule_in_stats() {
        // CLOSED ride at a non-Disney park counts as down...
        let rides = vec![
            ride(4, 2, "CLOSED", None),
            ride(5, 2, "OPERATING", Some(15)),
            ride(6, 2, "OPERATING", Some(5)),
            ride(7, 2, "OPERATING", Some(5)),
        ];
        let six_flags = compute_park_stats(false, &rides, None, 3);
        // weight 2 down out of 8 total -> 10 * 2/8 = 2.5
        assert_eq!(six_flags.shame_score, Some(2.5));

        // ...but not at a Disney park
        let disney = compute_park_stats(true, &rides, None, 3);
        assert_eq!(disney.shame_score, Some(0.0));
    }

    #[test]
    fn test_no_score_when_park_closed() {
        let rides = vec![ride(1, 1, "DOWN", None), ride(2, 2, "DOWN", None)];
        let stats = compute_park_stats(false, &rides, None, 3);
        assert!(!stats.park_appears_open);
        assert_eq!(stats.shame_score, None);
    }

    #[test]
    fn test_schedule_hint_opens_park() {
        // Under the ride-count threshold, but the schedule says open
        let rides = vec![
            ride(1, 2, "OPERATING", Some(10)),
            ride(2, 2, "DOWN", None),
        ];
        let stats = compute_park_stats(false, &rides, Some(true), 3);
        assert!(stats.park_appears_open);
        assert!(stats.shame_score.is_some());
    }

    #[test]
    fn test_wait_stats_cover_open_rides_only() {
        let rides = vec![
            ride(1, 2, "OPERATING", Some(40)),
            ride(2, 2, "OPERATING", Some(20)),
            ride(3, 2, "DOWN", Some(90)), // ignored: not open
            ride(4, 2, "OPERATING", None),
        ];
        let stats = compute_park_stats(false, &rides, None, 3);
        assert_eq!(stats.avg_wait_time, Some(30.0));
        assert_eq!(stats.max_wait_time, Some(40));
    }

    #[test]
    fn test_open_plus_closed_equals_tracked() {
        let rides = vec![
            ride(1, 1, "OPERATING", Some(5)),
            ride(2, 2, "DOWN", None),
            ride(3, 3, "CLOSED", None),
        ];
        let stats = compute_park_stats(false, &rides, None, 1);
        assert_eq!(
            stats.rides_open + stats.rides_closed,
            stats.rides_tracked
        );
    }
}
