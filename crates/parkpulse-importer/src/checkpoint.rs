//! Import checkpoint state machine.
//!
//! ```text
//! PENDING -> IN_PROGRESS -> COMPLETED
//!                |             ^
//!                +-> PAUSED ---+
//!                +-> FAILED
//!                +-> CANCELLED
//! ```
//!
//! PAUSED and FAILED are resumable; CANCELLED and COMPLETED are terminal.
//! Transitions are validated in code and enforced with guarded UPDATEs,
//! so two racing admins cannot corrupt a checkpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Import lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ImportStatus {
    /// Convert from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "PAUSED" => Some(Self::Paused),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether an import in this state may be resumed.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Pending | Self::Paused | Self::Failed)
    }

    /// Whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a transition to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::InProgress | Self::Cancelled)
            | (
                Self::InProgress,
                Self::Completed | Self::Paused | Self::Failed | Self::Cancelled,
            )
            | (Self::Paused, Self::InProgress | Self::Cancelled)
            | (Self::Failed, Self::InProgress | Self::Cancelled) => true,
            _ => false,
        }
    }
}

/// One import checkpoint row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportCheckpoint {
    pub import_id: Uuid,
    pub destination_uuid: String,
    pub status: String,
    pub records_imported: i64,
    pub errors_encountered: i32,
    pub files_processed: i32,
    pub last_processed_date: Option<NaiveDate>,
    pub last_processed_file: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ImportCheckpoint {
    /// Typed status of this checkpoint.
    #[must_use]
    pub fn status(&self) -> Option<ImportStatus> {
        ImportStatus::parse(&self.status)
    }

    /// Whether the import can be resumed.
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.status().is_some_and(|s| s.is_resumable())
    }
}

/// Create a new PENDING checkpoint.
pub async fn create(
    pool: &PgPool,
    destination_uuid: &str,
) -> Result<ImportCheckpoint, sqlx::Error> {
    sqlx::query_as::<_, ImportCheckpoint>(
        r"
        INSERT INTO import_checkpoints (import_id, destination_uuid, status)
        VALUES ($1, $2, 'PENDING')
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(destination_uuid)
    .fetch_one(pool)
    .await
}

/// Fetch a checkpoint by import id.
pub async fn get(
    pool: &PgPool,
    import_id: Uuid,
) -> Result<Option<ImportCheckpoint>, sqlx::Error> {
    sqlx::query_as::<_, ImportCheckpoint>(
        "SELECT * FROM import_checkpoints WHERE import_id = $1",
    )
    .bind(import_id)
    .fetch_optional(pool)
    .await
}

/// Latest resumable checkpoint for a destination, if any.
pub async fn get_resumable(
    pool: &PgPool,
    destination_uuid: &str,
) -> Result<Option<ImportCheckpoint>, sqlx::Error> {
    sqlx::query_as::<_, ImportCheckpoint>(
        r"
        SELECT * FROM import_checkpoints
        WHERE destination_uuid = $1
          AND status IN ('PENDING', 'PAUSED', 'FAILED', 'IN_PROGRESS')
        ORDER BY created_at DESC
        LIMIT 1
        ",
    )
    .bind(destination_uuid)
    .fetch_optional(pool)
    .await
}

/// All checkpoints, newest first.
pub async fn list(pool: &PgPool, limit: i64) -> Result<Vec<ImportCheckpoint>, sqlx::Error> {
    sqlx::query_as::<_, ImportCheckpoint>(
        "SELECT * FROM import_checkpoints ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Transition a checkpoint, enforcing the state machine.
///
/// Returns `false` when the stored state does not allow the transition
/// (including when a racing update got there first).
pub async fn transition(
    pool: &PgPool,
    import_id: Uuid,
    to: ImportStatus,
) -> Result<bool, sqlx::Error> {
    let Some(current) = get(pool, import_id).await? else {
        return Ok(false);
    };
    let Some(from) = current.status() else {
        return Ok(false);
    };
    if !from.can_transition_to(to) {
        return Ok(false);
    }

    let set_started = to == ImportStatus::InProgress && current.started_at.is_none();
    let set_completed = to.is_terminal() || to == ImportStatus::Failed;

    // The WHERE clause re-checks the source state, so concurrent
    // transitions cannot both win.
    let result = sqlx::query(
        r"
        UPDATE import_checkpoints
        SET status = $3,
            started_at = CASE WHEN $4 THEN NOW() ELSE started_at END,
            completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END
        WHERE import_id = $1 AND status = $2
        ",
    )
    .bind(import_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(set_started)
    .bind(set_completed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Persist progress after a checkpointed batch.
pub async fn update_progress(
    pool: &PgPool,
    import_id: Uuid,
    last_processed_date: NaiveDate,
    last_processed_file: &str,
    records_delta: i64,
    files_delta: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE import_checkpoints
        SET last_processed_date = $2,
            last_processed_file = $3,
            records_imported = records_imported + $4,
            files_processed = files_processed + $5
        WHERE import_id = $1
        ",
    )
    .bind(import_id)
    .bind(last_processed_date)
    .bind(last_processed_file)
    .bind(records_delta)
    .bind(files_delta)
    .execute(pool)
    .await?;
    Ok(())
}

/// Bump the error counter.
pub async fn record_error(pool: &PgPool, import_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE import_checkpoints SET errors_encountered = errors_encountered + 1 WHERE import_id = $1",
    )
    .bind(import_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use ImportStatus::{Cancelled, Completed, Failed, InProgress, Paused, Pending};

        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Paused));
        assert!(InProgress.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(Paused.can_transition_to(InProgress));
        assert!(Failed.can_transition_to(InProgress));
    }

    #[test]
    fn test_illegal_transitions() {
        use ImportStatus::{Cancelled, Completed, InProgress, Paused, Pending};

        // CANCELLED is terminal
        assert!(!Cancelled.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Pending));
        // COMPLETED is terminal
        assert!(!Completed.can_transition_to(InProgress));
        // No skipping the IN_PROGRESS step
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Paused.can_transition_to(Completed));
    }

    #[test]
    fn test_resumable_states() {
        assert!(ImportStatus::Pending.is_resumable());
        assert!(ImportStatus::Paused.is_resumable());
        assert!(ImportStatus::Failed.is_resumable());
        assert!(!ImportStatus::Completed.is_resumable());
        assert!(!ImportStatus::Cancelled.is_resumable());
        assert!(!ImportStatus::InProgress.is_resumable());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ImportStatus::Pending,
            ImportStatus::InProgress,
            ImportStatus::Paused,
            ImportStatus::Completed,
            ImportStatus::Failed,
            ImportStatus::Cancelled,
        ] {
            assert_eq!(ImportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ImportStatus::parse("RUNNING"), None);
    }
}
