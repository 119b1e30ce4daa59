//! Admin endpoints: archive imports, aggregation runs, storage metrics.
//!
//! The import surface drives the checkpoint state machine; processing
//! itself runs inside this process as a spawned task, so there is no
//! out-of-band CLI to coordinate with.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use parkpulse_core::error::ApiError;
use parkpulse_core::quality;
use parkpulse_importer::checkpoint;
use parkpulse_importer::ImportStatus;
use parkpulse_stats::{log as aggregation_log, storage, Aggregator};

use crate::app::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Create the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/import/start", post(start_import))
        .route("/api/admin/import/list", get(list_imports))
        .route("/api/admin/import/status/:import_id", get(import_status))
        .route("/api/admin/import/resume/:import_id", post(resume_import))
        .route("/api/admin/import/pause/:import_id", post(pause_import))
        .route("/api/admin/import/cancel/:import_id", post(cancel_import))
        .route("/api/admin/import/:import_id/quality", get(import_quality))
        .route("/api/admin/sync/parks", post(sync_parks))
        .route("/api/admin/sync/metadata", post(sync_metadata))
        .route("/api/admin/aggregate/hourly", post(run_hourly))
        .route("/api/admin/aggregate/daily", post(run_daily))
        .route("/api/admin/aggregate/weekly", post(run_weekly))
        .route("/api/admin/aggregation/log", get(aggregation_runs))
        .route("/api/admin/aggregation/barrier/:date", get(cleanup_barrier))
        .route("/api/admin/storage/metrics", get(storage_metrics))
        .route("/api/admin/storage/metrics/capture", post(capture_storage))
        .route("/api/admin/cache/clear", post(clear_cache))
}

// ==================== Imports ====================

/// Body for starting an import.
#[derive(Debug, Deserialize)]
pub struct StartImportRequest {
    pub destination_uuid: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Create a checkpoint for a destination.
///
/// If a resumable import already exists it is returned instead of
/// creating a duplicate; use the resume endpoint to begin processing.
pub async fn start_import(
    State(state): State<AppState>,
    Json(body): Json<StartImportRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.destination_uuid.trim().is_empty() {
        return Err(ApiError::Validation("destination_uuid is required".into()));
    }

    if let Some(existing) = checkpoint::get_resumable(&state.db, &body.destination_uuid)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
    {
        return Ok(Json(serde_json::json!({
            "import_id": existing.import_id,
            "status": existing.status,
            "message": "A resumable import already exists for this destination",
        })));
    }

    let cp = checkpoint::create(&state.db, &body.destination_uuid)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Json(serde_json::json!({
        "import_id": cp.import_id,
        "destination_uuid": cp.destination_uuid,
        "status": cp.status,
        "message": "Import created. Use the resume endpoint to start processing.",
    })))
}

/// List recent imports.
pub async fn list_imports(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<checkpoint::ImportCheckpoint>>> {
    let rows = checkpoint::list(&state.db, 100)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(rows))
}

/// Fetch one import's checkpoint.
pub async fn import_status(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<checkpoint::ImportCheckpoint>> {
    checkpoint::get(&state.db, import_id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("import {import_id}")))
}

/// Resume (or start) processing for an import.
pub async fn resume_import(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let cp = checkpoint::get(&state.db, import_id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| ApiError::NotFound(format!("import {import_id}")))?;

    if !cp.can_resume() {
        return Err(ApiError::Conflict(format!(
            "import {import_id} is {} and cannot be resumed",
            cp.status
        )));
    }

    let importer = state.importer.clone();
    let destination = cp.destination_uuid.clone();
    tokio::spawn(async move {
        if let Err(e) = importer.import_destination(&destination, None, None).await {
            tracing::error!(import_id = %import_id, error = %e, "Archive import task failed");
        }
    });

    Ok(Json(serde_json::json!({
        "import_id": import_id,
        "message": "Import processing started",
    })))
}

/// Pause a running import.
pub async fn pause_import(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let transitioned = checkpoint::transition(&state.db, import_id, ImportStatus::Paused)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    if !transitioned {
        return Err(ApiError::Conflict(format!(
            "import {import_id} is not in a pausable state"
        )));
    }
    Ok(Json(serde_json::json!({
        "import_id": import_id,
        "status": "PAUSED",
    })))
}

/// Cancel an import. CANCELLED is terminal.
pub async fn cancel_import(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let transitioned = checkpoint::transition(&state.db, import_id, ImportStatus::Cancelled)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    if !transitioned {
        return Err(ApiError::Conflict(format!(
            "import {import_id} is not in a cancellable state"
        )));
    }
    Ok(Json(serde_json::json!({
        "import_id": import_id,
        "status": "CANCELLED",
    })))
}

/// Quality report for one import.
pub async fn import_quality(
    State(state): State<AppState>,
    Path(import_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let counts = quality::count_by_type(&state.db, import_id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let issues = quality::issues_for_import(&state.db, import_id, 100)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let counts: serde_json::Map<String, serde_json::Value> = counts
        .into_iter()
        .map(|(issue_type, count)| (issue_type, serde_json::json!(count)))
        .collect();

    Ok(Json(serde_json::json!({
        "import_id": import_id,
        "counts_by_type": counts,
        "recent_issues": issues,
    })))
}

// ==================== Entity sync ====================

/// Bootstrap or refresh parks and rides from the upstream park list.
pub async fn sync_parks(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let client = parkpulse_upstream::QueueTimesClient::new(Some(
        state.settings.collector.upstream_timeout_secs,
    ));
    let outcome = parkpulse_collector::sync_parks(
        &state.db,
        &client,
        state.settings.collector.filter_country.as_deref(),
    )
    .await
    .map_err(ApiError::Internal)?;

    Ok(Json(serde_json::json!({
        "parks_processed": outcome.parks_processed,
        "parks_written": outcome.parks_written,
        "rides_written": outcome.rides_written,
        "errors": outcome.errors,
    })))
}

/// Refresh ride categories and coordinates from the wiki source.
pub async fn sync_metadata(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let client = parkpulse_upstream::WikiParksClient::new(
        state.settings.import.archive_base_url.clone(),
        Some(state.settings.collector.upstream_timeout_secs),
    );
    let outcome = parkpulse_collector::sync_metadata(&state.db, &client)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(serde_json::json!({
        "parks_processed": outcome.parks_processed,
        "rides_updated": outcome.rides_updated,
        "unmatched": outcome.unmatched,
    })))
}

// ==================== Aggregation ====================

/// Body for aggregation runs.
#[derive(Debug, Deserialize)]
pub struct AggregateRequest {
    /// Target date; defaults to yesterday (Pacific)
    pub date: Option<NaiveDate>,
    /// Restrict daily runs to one park timezone
    pub timezone: Option<String>,
    /// Rerun even if a successful run exists
    #[serde(default)]
    pub force: bool,
}

fn aggregator(state: &AppState) -> Aggregator {
    Aggregator::new(
        state.db.clone(),
        state.settings.collector.snapshot_interval_minutes,
    )
}

fn default_target(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| parkpulse_queries::period::yesterday_pacific())
}

/// Run hourly aggregation for a date.
pub async fn run_hourly(
    State(state): State<AppState>,
    Json(body): Json<AggregateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let date = default_target(body.date);
    let outcome = aggregator(&state)
        .run_hourly(date, body.force)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "date": date, "outcome": format!("{outcome:?}") })))
}

/// Run daily aggregation for a date.
pub async fn run_daily(
    State(state): State<AppState>,
    Json(body): Json<AggregateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let date = default_target(body.date);
    let outcome = aggregator(&state)
        .run_daily(date, body.timezone.as_deref(), body.force)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "date": date, "outcome": format!("{outcome:?}") })))
}

/// Run weekly aggregation for the week containing a date.
pub async fn run_weekly(
    State(state): State<AppState>,
    Json(body): Json<AggregateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let date = default_target(body.date);
    let outcome = aggregator(&state)
        .run_weekly(date, body.force)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "date": date, "outcome": format!("{outcome:?}") })))
}

/// Recent aggregation runs.
pub async fn aggregation_runs(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<aggregation_log::AggregationLogEntry>>> {
    let rows = aggregation_log::recent_runs(&state.db, 100)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(rows))
}

/// Whether raw snapshots of a date are behind the cleanup barrier.
///
/// Partition maintenance must refuse to drop a month until every date in
/// it reports `cleanup_allowed: true`.
pub async fn cleanup_barrier(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> ApiResult<Json<serde_json::Value>> {
    let allowed = aggregator(&state)
        .cleanup_allowed(date)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(serde_json::json!({
        "date": date,
        "cleanup_allowed": allowed,
    })))
}

/// Drop every cached query result.
pub async fn clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.cache.clear_all();
    Json(serde_json::json!({ "cleared": true }))
}

// ==================== Storage ====================

/// Latest storage metrics per table.
pub async fn storage_metrics(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<storage::StorageMetric>>> {
    let rows = storage::latest_metrics(&state.db)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(rows))
}

/// Measure and persist storage metrics now.
pub async fn capture_storage(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<storage::StorageMetric>>> {
    let rows = storage::capture_metrics(&state.db)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(rows))
}
