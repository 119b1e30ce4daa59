//! Live rankings materialization.
//!
//! Truncate staging, rebuild with one INSERT...SELECT per table, then
//! publish with a three-way rename inside one transaction. Postgres DDL is
//! transactional, so readers see the previous generation or the next one,
//! never a mix. Any failure before the rename leaves the served tables
//! untouched and the next cycle retries.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info};

use parkpulse_core::metrics::DORMANT_RIDE_DAYS;
use parkpulse_stats::bounds::{pacific_day_bounds_utc, pacific_today};
use parkpulse_stats::sql::IS_DOWN;

/// Row counts from one materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeOutcome {
    pub parks: i64,
    pub rides: i64,
    pub elapsed_ms: u128,
}

/// Rebuilds the live rankings tables each cycle.
pub struct LiveRankingsMaterializer {
    pool: PgPool,
    live_window_hours: i64,
    snapshot_interval_minutes: i32,
}

impl LiveRankingsMaterializer {
    /// Create a materializer.
    #[must_use]
    pub fn new(pool: PgPool, live_window_hours: i64, snapshot_interval_minutes: i32) -> Self {
        Self {
            pool,
            live_window_hours,
            snapshot_interval_minutes,
        }
    }

    /// Rebuild and publish both rankings tables.
    pub async fn run(&self) -> anyhow::Result<MaterializeOutcome> {
        let started = std::time::Instant::now();
        let (start_utc, end_utc) = pacific_day_bounds_utc(pacific_today());

        let parks = self.build_park_staging(start_utc, end_utc).await?;
        let rides = self.build_ride_staging(start_utc, end_utc).await?;

        // Publish: one transaction, both table pairs, readers never see a
        // partial generation.
        let mut tx = self.pool.begin().await?;
        for table in ["park_live_rankings", "ride_live_rankings"] {
            sqlx::query(&format!("ALTER TABLE {table} RENAME TO {table}_old"))
                .execute(&mut *tx)
                .await?;
            sqlx::query(&format!("ALTER TABLE {table}_staging RENAME TO {table}"))
                .execute(&mut *tx)
                .await?;
            sqlx::query(&format!("ALTER TABLE {table}_old RENAME TO {table}_staging"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let outcome = MaterializeOutcome {
            parks,
            rides,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            parks = outcome.parks,
            rides = outcome.rides,
            elapsed_ms = outcome.elapsed_ms,
            "Live rankings published"
        );
        Ok(outcome)
    }

    /// Rebuild the park staging table; returns the staged row count.
    async fn build_park_staging(
        &self,
        start_utc: chrono::DateTime<Utc>,
        end_utc: chrono::DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("TRUNCATE TABLE park_live_rankings_staging")
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            r"
            INSERT INTO park_live_rankings_staging
                (park_id, queue_times_id, park_name, location, timezone,
                 is_disney, is_universal, rides_down, total_rides, shame_score,
                 park_is_open, total_downtime_hours, weighted_downtime_hours,
                 total_park_weight, calculated_at)
            WITH latest_snapshot AS (
                SELECT ride_id, MAX(recorded_at) AS latest_recorded_at
                FROM ride_status_snapshots
                WHERE recorded_at >= $1 AND recorded_at < $2
                  AND recorded_at >= NOW() - ($3::BIGINT * INTERVAL '1 hour')
                GROUP BY ride_id
            ),
            rides_currently_down AS (
                SELECT DISTINCT r.ride_id, r.park_id
                FROM rides r
                JOIN parks p ON r.park_id = p.park_id
                JOIN ride_status_snapshots rss ON r.ride_id = rss.ride_id
                JOIN latest_snapshot ls
                    ON rss.ride_id = ls.ride_id AND rss.recorded_at = ls.latest_recorded_at
                JOIN park_activity_snapshots pas
                    ON r.park_id = pas.park_id AND rss.recorded_at = pas.recorded_at
                WHERE r.is_active = TRUE
                  AND r.category = 'ATTRACTION'
                  AND {IS_DOWN}
                  AND pas.park_appears_open = TRUE
                  AND r.last_operated_at >= NOW() - INTERVAL '{DORMANT_RIDE_DAYS} days'
            ),
            park_weights AS (
                SELECT p.park_id,
                       SUM(COALESCE(rc.tier_weight, 2)) AS total_park_weight,
                       COUNT(DISTINCT r.ride_id) AS total_rides
                FROM parks p
                JOIN rides r ON p.park_id = r.park_id
                LEFT JOIN ride_classifications rc ON r.ride_id = rc.ride_id
                WHERE p.is_active = TRUE
                  AND r.is_active = TRUE
                  AND r.category = 'ATTRACTION'
                  AND r.last_operated_at >= NOW() - INTERVAL '{DORMANT_RIDE_DAYS} days'
                GROUP BY p.park_id
            ),
            latest_pas_times AS (
                SELECT park_id, MAX(recorded_at) AS latest_at
                FROM park_activity_snapshots
                WHERE recorded_at >= $1 AND recorded_at < $2
                GROUP BY park_id
            ),
            latest_park_state AS (
                SELECT pas.park_id, pas.shame_score, pas.park_appears_open
                FROM park_activity_snapshots pas
                JOIN latest_pas_times lt
                    ON pas.park_id = lt.park_id AND pas.recorded_at = lt.latest_at
            )
            SELECT
                p.park_id,
                p.queue_times_id,
                p.name AS park_name,
                p.city || ', ' || p.state_province AS location,
                p.timezone,
                p.is_disney,
                p.is_universal,
                COUNT(DISTINCT rcd.ride_id)::INT AS rides_down,
                pw.total_rides::INT,
                COALESCE(lps.shame_score, 0.0)::FLOAT8 AS shame_score,
                COALESCE(lps.park_appears_open, FALSE) AS park_is_open,
                ROUND((SUM(CASE WHEN pas.park_appears_open = TRUE AND {IS_DOWN}
                               THEN $4 ELSE 0 END) / 60.0)::numeric, 2)::FLOAT8
                    AS total_downtime_hours,
                ROUND((SUM(CASE WHEN pas.park_appears_open = TRUE AND {IS_DOWN}
                               THEN $4 * COALESCE(rc.tier_weight, 2) ELSE 0 END) / 60.0)::numeric, 2)::FLOAT8
                    AS weighted_downtime_hours,
                pw.total_park_weight::FLOAT8,
                NOW()
            FROM parks p
            JOIN rides r
                ON p.park_id = r.park_id
               AND r.is_active = TRUE
               AND r.category = 'ATTRACTION'
            LEFT JOIN ride_classifications rc ON r.ride_id = rc.ride_id
            JOIN ride_status_snapshots rss ON r.ride_id = rss.ride_id
            JOIN park_activity_snapshots pas
                ON p.park_id = pas.park_id AND pas.recorded_at = rss.recorded_at
            JOIN park_weights pw ON p.park_id = pw.park_id
            LEFT JOIN rides_currently_down rcd ON r.ride_id = rcd.ride_id
            LEFT JOIN latest_park_state lps ON p.park_id = lps.park_id
            WHERE rss.recorded_at >= $1 AND rss.recorded_at < $2
              AND p.is_active = TRUE
            GROUP BY p.park_id, p.queue_times_id, p.name, p.city, p.state_province,
                     p.timezone, p.is_disney, p.is_universal,
                     pw.total_park_weight, pw.total_rides,
                     lps.shame_score, lps.park_appears_open
            "
        );

        sqlx::query(&insert)
            .bind(start_utc)
            .bind(end_utc)
            .bind(self.live_window_hours)
            .bind(self.snapshot_interval_minutes)
            .execute(&mut *tx)
            .await?;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM park_live_rankings_staging")
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        debug!(parks = count, "Staged park live rankings");
        Ok(count)
    }

    /// Rebuild the ride staging table; returns the staged row count.
    async fn build_ride_staging(
        &self,
        start_utc: chrono::DateTime<Utc>,
        end_utc: chrono::DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("TRUNCATE TABLE ride_live_rankings_staging")
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            r"
            INSERT INTO ride_live_rankings_staging
                (ride_id, park_id, queue_times_id, ride_name, park_name,
                 tier, tier_weight, category, is_disney, is_universal,
                 is_down, current_status, current_wait_time, last_status_change,
                 downtime_hours, downtime_incidents, avg_wait_time, max_wait_time,
                 calculated_at)
            WITH latest_snapshot AS (
                SELECT ride_id, MAX(recorded_at) AS latest_recorded_at
                FROM ride_status_snapshots
                WHERE recorded_at >= $1 AND recorded_at < $2
                  AND recorded_at >= NOW() - ($3::BIGINT * INTERVAL '1 hour')
                GROUP BY ride_id
            ),
            ride_current AS (
                SELECT rss.ride_id,
                       rss.status AS current_status,
                       rss.wait_time AS current_wait_time,
                       rss.computed_is_open,
                       pas.park_appears_open
                FROM ride_status_snapshots rss
                JOIN latest_snapshot ls
                    ON rss.ride_id = ls.ride_id AND rss.recorded_at = ls.latest_recorded_at
                JOIN rides r ON rss.ride_id = r.ride_id
                LEFT JOIN park_activity_snapshots pas
                    ON pas.park_id = r.park_id AND pas.recorded_at = rss.recorded_at
            ),
            last_changes AS (
                SELECT ride_id, MAX(changed_at) AS last_status_change,
                       COUNT(*) FILTER (WHERE to_status <> 'OPERATING') AS downtime_incidents
                FROM ride_status_changes
                WHERE changed_at >= $1
                GROUP BY ride_id
            )
            SELECT
                r.ride_id,
                r.park_id,
                r.queue_times_id,
                r.name AS ride_name,
                p.name AS park_name,
                COALESCE(rc.tier, 2)::INT AS tier,
                COALESCE(rc.tier_weight, 2)::FLOAT8 AS tier_weight,
                r.category,
                p.is_disney,
                p.is_universal,
                CASE
                    WHEN COALESCE(cur.park_appears_open, FALSE) = FALSE THEN FALSE
                    WHEN (CASE WHEN p.is_disney = TRUE OR p.is_universal = TRUE
                               THEN cur.current_status = 'DOWN'
                               ELSE cur.current_status IN ('DOWN', 'CLOSED')
                                    OR (cur.current_status IS NULL AND cur.computed_is_open = FALSE)
                          END) THEN TRUE
                    ELSE FALSE
                END AS is_down,
                cur.current_status,
                cur.current_wait_time,
                lc.last_status_change,
                ROUND((SUM(CASE WHEN pas.park_appears_open = TRUE AND {IS_DOWN}
                               THEN $4 ELSE 0 END) / 60.0)::numeric, 2)::FLOAT8
                    AS downtime_hours,
                COALESCE(MAX(lc.downtime_incidents), 0)::INT AS downtime_incidents,
                ROUND(AVG(CASE WHEN rss.wait_time > 0 THEN rss.wait_time END)::numeric, 1)::FLOAT8
                    AS avg_wait_time,
                MAX(rss.wait_time) AS max_wait_time,
                NOW()
            FROM rides r
            JOIN parks p ON r.park_id = p.park_id
            LEFT JOIN ride_classifications rc ON r.ride_id = rc.ride_id
            JOIN ride_status_snapshots rss ON r.ride_id = rss.ride_id
            JOIN park_activity_snapshots pas
                ON p.park_id = pas.park_id AND pas.recorded_at = rss.recorded_at
            LEFT JOIN ride_current cur ON r.ride_id = cur.ride_id
            LEFT JOIN last_changes lc ON r.ride_id = lc.ride_id
            WHERE rss.recorded_at >= $1 AND rss.recorded_at < $2
              AND r.is_active = TRUE
              AND r.category = 'ATTRACTION'
              AND p.is_active = TRUE
              AND r.last_operated_at >= NOW() - INTERVAL '{DORMANT_RIDE_DAYS} days'
            GROUP BY r.ride_id, r.park_id, r.queue_times_id, r.name, r.category,
                     p.name, p.is_disney, p.is_universal,
                     rc.tier, rc.tier_weight,
                     cur.computed_is_open, cur.current_status, cur.current_wait_time,
                     cur.park_appears_open, lc.last_status_change
            HAVING SUM(CASE WHEN pas.park_appears_open = TRUE AND {IS_DOWN}
                           THEN 1 ELSE 0 END) > 0
            "
        );

        sqlx::query(&insert)
            .bind(start_utc)
            .bind(end_utc)
            .bind(self.live_window_hours)
            .bind(self.snapshot_interval_minutes)
            .execute(&mut *tx)
            .await?;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ride_live_rankings_staging")
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        debug!(rides = count, "Staged ride live rankings");
        Ok(count)
    }
}
