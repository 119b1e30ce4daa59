//! Storage metrics.
//!
//! Per-table row counts and sizes, persisted so growth rates can be
//! tracked day over day. The snapshot tables dominate; the growth number
//! is what decides when to add partitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Tables worth measuring.
const TRACKED_TABLES: [&str; 10] = [
    "ride_status_snapshots",
    "park_activity_snapshots",
    "ride_status_changes",
    "ride_hourly_stats",
    "park_hourly_stats",
    "ride_daily_stats",
    "park_daily_stats",
    "ride_weekly_stats",
    "park_weekly_stats",
    "data_quality_log",
];

/// One stored measurement.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StorageMetric {
    pub table_name: String,
    pub row_count: i64,
    pub data_size_bytes: i64,
    pub index_size_bytes: i64,
    pub rows_per_day: Option<f64>,
    pub measured_at: DateTime<Utc>,
}

/// Measure every tracked table and persist the results.
pub async fn capture_metrics(pool: &PgPool) -> Result<Vec<StorageMetric>, sqlx::Error> {
    let mut metrics = Vec::with_capacity(TRACKED_TABLES.len());

    for table in TRACKED_TABLES {
        let sizes: (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT COALESCE(c.reltuples::BIGINT, 0),
                   COALESCE(pg_table_size(c.oid), 0)::BIGINT,
                   COALESCE(pg_indexes_size(c.oid), 0)::BIGINT
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relname = $1 AND n.nspname = 'public'
            ",
        )
        .bind(table)
        .fetch_optional(pool)
        .await?
        .unwrap_or((0, 0, 0));

        // Day-over-day growth from the previous measurement
        let previous: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            r"
            SELECT row_count, measured_at FROM storage_metrics
            WHERE table_name = $1
            ORDER BY measured_at DESC
            LIMIT 1
            ",
        )
        .bind(table)
        .fetch_optional(pool)
        .await?;

        let now = Utc::now();
        let rows_per_day = previous.and_then(|(prev_rows, prev_at)| {
            let days = (now - prev_at).num_seconds() as f64 / 86_400.0;
            if days <= 0.0 {
                return None;
            }
            Some(((sizes.0 - prev_rows) as f64 / days * 10.0).round() / 10.0)
        });

        let metric: StorageMetric = sqlx::query_as(
            r"
            INSERT INTO storage_metrics
                (table_name, row_count, data_size_bytes, index_size_bytes,
                 rows_per_day, measured_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING *
            ",
        )
        .bind(table)
        .bind(sizes.0)
        .bind(sizes.1)
        .bind(sizes.2)
        .bind(rows_per_day)
        .fetch_one(pool)
        .await?;

        metrics.push(metric);
    }

    Ok(metrics)
}

/// Latest measurement per table.
pub async fn latest_metrics(pool: &PgPool) -> Result<Vec<StorageMetric>, sqlx::Error> {
    sqlx::query_as::<_, StorageMetric>(
        r"
        SELECT DISTINCT ON (table_name) *
        FROM storage_metrics
        ORDER BY table_name, measured_at DESC
        ",
    )
    .fetch_all(pool)
    .await
}
