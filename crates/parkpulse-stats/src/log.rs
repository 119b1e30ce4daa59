//! Aggregation run log.
//!
//! Every aggregation run writes a `running` row on start and a terminal
//! `success` or `failed` row on finish. The success row for a (date,
//! level) pair is the barrier any raw-snapshot cleanup must check before
//! touching that date. A `running` row older than six hours is treated as
//! dead and replaced on the next attempt.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

/// Stale threshold for `running` rows, in hours.
const STALE_RUNNING_HOURS: i64 = 6;

/// One aggregation log row.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct AggregationLogEntry {
    pub log_id: i64,
    pub aggregation_date: NaiveDate,
    /// hourly / daily / weekly
    pub aggregation_type: String,
    /// running / success / failed
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parks_processed: i32,
    pub rides_processed: i32,
    pub error_message: Option<String>,
}

/// Outcome of attempting to start a run.
#[derive(Debug)]
pub enum RunDecision {
    /// A `running` row was created; proceed and finish with this log id.
    Proceed { log_id: i64 },
    /// A successful run already exists and `force` was not set.
    AlreadyAggregated,
    /// Another run appears to be in flight.
    InFlight,
}

/// Latest log row for a (date, level) pair.
pub async fn get_latest(
    pool: &PgPool,
    date: NaiveDate,
    aggregation_type: &str,
) -> Result<Option<AggregationLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, AggregationLogEntry>(
        r"
        SELECT * FROM aggregation_log
        WHERE aggregation_date = $1 AND aggregation_type = $2
        ORDER BY started_at DESC
        LIMIT 1
        ",
    )
    .bind(date)
    .bind(aggregation_type)
    .fetch_optional(pool)
    .await
}

/// Whether a successful run exists for (date, level).
///
/// This is the cleanup barrier: raw snapshot deletion for a date may
/// proceed only when this returns `true` for the daily level.
pub async fn is_date_aggregated(
    pool: &PgPool,
    date: NaiveDate,
    aggregation_type: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        r"
        SELECT log_id FROM aggregation_log
        WHERE aggregation_date = $1 AND aggregation_type = $2 AND status = 'success'
        LIMIT 1
        ",
    )
    .bind(date)
    .bind(aggregation_type)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Try to start a run, enforcing the rerun protocol.
pub async fn start_run(
    pool: &PgPool,
    date: NaiveDate,
    aggregation_type: &str,
    force: bool,
) -> Result<RunDecision, sqlx::Error> {
    if !force && is_date_aggregated(pool, date, aggregation_type).await? {
        info!(%date, level = aggregation_type, "Aggregation already completed, skipping");
        return Ok(RunDecision::AlreadyAggregated);
    }

    if let Some(latest) = get_latest(pool, date, aggregation_type).await? {
        if latest.status == "running" {
            let age_hours = (Utc::now() - latest.started_at).num_hours();
            if age_hours < STALE_RUNNING_HOURS {
                warn!(%date, level = aggregation_type, "Aggregation already in flight");
                return Ok(RunDecision::InFlight);
            }
            warn!(
                %date,
                level = aggregation_type,
                age_hours,
                "Marking stale running aggregation as failed"
            );
            mark_failed(pool, latest.log_id, "stale running row replaced").await?;
        }
    }

    let row: (i64,) = sqlx::query_as(
        r"
        INSERT INTO aggregation_log
            (aggregation_date, aggregation_type, status, started_at,
             parks_processed, rides_processed)
        VALUES ($1, $2, 'running', NOW(), 0, 0)
        RETURNING log_id
        ",
    )
    .bind(date)
    .bind(aggregation_type)
    .fetch_one(pool)
    .await?;

    Ok(RunDecision::Proceed { log_id: row.0 })
}

/// Mark a run successful with its counters.
pub async fn mark_success(
    pool: &PgPool,
    log_id: i64,
    parks_processed: i32,
    rides_processed: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE aggregation_log
        SET status = 'success', completed_at = NOW(),
            parks_processed = $2, rides_processed = $3
        WHERE log_id = $1
        ",
    )
    .bind(log_id)
    .bind(parks_processed)
    .bind(rides_processed)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a run failed with the error message.
pub async fn mark_failed(
    pool: &PgPool,
    log_id: i64,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE aggregation_log
        SET status = 'failed', completed_at = NOW(), error_message = $2
        WHERE log_id = $1
        ",
    )
    .bind(log_id)
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Recent log rows, newest first.
pub async fn recent_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<AggregationLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, AggregationLogEntry>(
        r"
        SELECT * FROM aggregation_log
        ORDER BY started_at DESC
        LIMIT $1
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
