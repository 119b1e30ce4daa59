//! Aggregation engine entry points.
//!
//! Each level runs under the log protocol: check for a prior success
//! (skip unless forced), write a `running` row, finish with `success` and
//! counters or `failed` and the error message. Levels are causally
//! ordered per date: daily reads hourly output, weekly reads daily.

use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use tracing::{error, info};

use crate::log::{self, RunDecision};
use crate::{daily, hourly, weekly};

/// What a run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// Work completed; counters are (parks, rides) rows touched.
    Completed { parks: i32, rides: i32 },
    /// Skipped: a successful run already existed and force was off.
    SkippedAlreadyAggregated,
    /// Skipped: another run holds the running row.
    SkippedInFlight,
}

/// The aggregation engine.
pub struct Aggregator {
    pool: PgPool,
    snapshot_interval_minutes: i32,
}

impl Aggregator {
    /// Create an engine.
    #[must_use]
    pub fn new(pool: PgPool, snapshot_interval_minutes: i32) -> Self {
        Self {
            pool,
            snapshot_interval_minutes,
        }
    }

    /// Aggregate the UTC hours of one UTC date.
    pub async fn run_hourly(
        &self,
        target_date: NaiveDate,
        force: bool,
    ) -> anyhow::Result<AggregationOutcome> {
        let log_id = match log::start_run(&self.pool, target_date, "hourly", force).await? {
            RunDecision::Proceed { log_id } => log_id,
            RunDecision::AlreadyAggregated => {
                return Ok(AggregationOutcome::SkippedAlreadyAggregated)
            }
            RunDecision::InFlight => return Ok(AggregationOutcome::SkippedInFlight),
        };

        let start_utc = Utc.from_utc_datetime(&target_date.and_time(chrono::NaiveTime::MIN));
        let end_utc = start_utc + chrono::Duration::days(1);

        let work = async {
            let rides =
                hourly::aggregate_ride_hours(&self.pool, start_utc, end_utc, self.snapshot_interval_minutes)
                    .await?;
            hourly::propagate_ride_operated(&self.pool, start_utc, end_utc).await?;
            let parks = hourly::aggregate_park_hours(&self.pool, start_utc, end_utc).await?;
            hourly::enrich_park_hours(&self.pool, start_utc, end_utc).await?;
            Ok::<(u64, u64), sqlx::Error>((parks, rides))
        };

        match work.await {
            Ok((parks, rides)) => {
                log::mark_success(&self.pool, log_id, parks as i32, rides as i32).await?;
                info!(%target_date, parks, rides, "Hourly aggregation complete");
                Ok(AggregationOutcome::Completed {
                    parks: parks as i32,
                    rides: rides as i32,
                })
            }
            Err(e) => {
                error!(%target_date, error = %e, "Hourly aggregation failed");
                log::mark_failed(&self.pool, log_id, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Aggregate one local calendar date, per park timezone.
    pub async fn run_daily(
        &self,
        target_date: NaiveDate,
        timezone_filter: Option<&str>,
        force: bool,
    ) -> anyhow::Result<AggregationOutcome> {
        let log_id = match log::start_run(&self.pool, target_date, "daily", force).await? {
            RunDecision::Proceed { log_id } => log_id,
            RunDecision::AlreadyAggregated => {
                return Ok(AggregationOutcome::SkippedAlreadyAggregated)
            }
            RunDecision::InFlight => return Ok(AggregationOutcome::SkippedInFlight),
        };

        let work = async {
            let mut parks = 0u64;
            let mut rides = 0u64;
            for timezone in daily::park_timezones(&self.pool, timezone_filter).await? {
                rides += daily::aggregate_ride_days(
                    &self.pool,
                    target_date,
                    &timezone,
                    self.snapshot_interval_minutes,
                )
                .await?;
                parks += daily::aggregate_park_days(&self.pool, target_date, &timezone).await?;
            }
            Ok::<(u64, u64), sqlx::Error>((parks, rides))
        };

        match work.await {
            Ok((parks, rides)) => {
                log::mark_success(&self.pool, log_id, parks as i32, rides as i32).await?;
                info!(%target_date, parks, rides, "Daily aggregation complete");
                Ok(AggregationOutcome::Completed {
                    parks: parks as i32,
                    rides: rides as i32,
                })
            }
            Err(e) => {
                error!(%target_date, error = %e, "Daily aggregation failed");
                log::mark_failed(&self.pool, log_id, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Aggregate the ISO week containing `target_date`, from daily rows.
    pub async fn run_weekly(
        &self,
        target_date: NaiveDate,
        force: bool,
    ) -> anyhow::Result<AggregationOutcome> {
        let log_id = match log::start_run(&self.pool, target_date, "weekly", force).await? {
            RunDecision::Proceed { log_id } => log_id,
            RunDecision::AlreadyAggregated => {
                return Ok(AggregationOutcome::SkippedAlreadyAggregated)
            }
            RunDecision::InFlight => return Ok(AggregationOutcome::SkippedInFlight),
        };

        let work = async {
            let rides = weekly::aggregate_ride_weeks(&self.pool, target_date).await?;
            weekly::update_ride_week_trends(&self.pool, target_date).await?;
            let parks = weekly::aggregate_park_weeks(&self.pool, target_date).await?;
            weekly::update_park_week_trends(&self.pool, target_date).await?;
            Ok::<(u64, u64), sqlx::Error>((parks, rides))
        };

        match work.await {
            Ok((parks, rides)) => {
                log::mark_success(&self.pool, log_id, parks as i32, rides as i32).await?;
                info!(%target_date, parks, rides, "Weekly aggregation complete");
                Ok(AggregationOutcome::Completed {
                    parks: parks as i32,
                    rides: rides as i32,
                })
            }
            Err(e) => {
                error!(%target_date, error = %e, "Weekly aggregation failed");
                log::mark_failed(&self.pool, log_id, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Whether raw snapshots of a date may be cleaned up.
    ///
    /// Deletion is allowed only behind a successful daily aggregation.
    pub async fn cleanup_allowed(&self, date: NaiveDate) -> Result<bool, sqlx::Error> {
        log::is_date_aggregated(&self.pool, date, "daily").await
    }
}
