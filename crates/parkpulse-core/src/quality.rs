//! Data quality log repository.
//!
//! Parse errors, mapping failures, and transport faults land here instead
//! of failing a cycle. Both the collector and the archive importer write
//! through these functions.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One quality issue row.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct QualityIssue {
    pub log_id: i64,
    pub import_id: Option<Uuid>,
    /// PARSE_ERROR / MAPPING_FAILED / TRANSPORT_ERROR / SCHEMA_VIOLATION
    pub issue_type: String,
    /// What kind of entity the external id refers to
    pub entity_type: String,
    pub external_id: String,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// Record a quality issue.
pub async fn log_issue(
    pool: &PgPool,
    import_id: Option<Uuid>,
    issue_type: &str,
    entity_type: &str,
    external_id: &str,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO data_quality_log
            (import_id, issue_type, entity_type, external_id, description, recorded_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ",
    )
    .bind(import_id)
    .bind(issue_type)
    .bind(entity_type)
    .bind(external_id)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(())
}

/// Issues recorded for one import, newest first.
pub async fn issues_for_import(
    pool: &PgPool,
    import_id: Uuid,
    limit: i64,
) -> Result<Vec<QualityIssue>, sqlx::Error> {
    sqlx::query_as::<_, QualityIssue>(
        r"
        SELECT * FROM data_quality_log
        WHERE import_id = $1
        ORDER BY recorded_at DESC
        LIMIT $2
        ",
    )
    .bind(import_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Per-type issue counts for one import.
pub async fn count_by_type(
    pool: &PgPool,
    import_id: Uuid,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as(
        r"
        SELECT issue_type, COUNT(*) AS issue_count
        FROM data_quality_log
        WHERE import_id = $1
        GROUP BY issue_type
        ORDER BY issue_count DESC
        ",
    )
    .bind(import_id)
    .fetch_all(pool)
    .await
}
