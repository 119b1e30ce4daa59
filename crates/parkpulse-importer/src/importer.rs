//! Archive import orchestration.
//!
//! Single-producer streaming: archive objects are fetched in date order,
//! parsed, resolved, and written in batches. Every
//! `checkpoint_interval` batches the checkpoint row is updated, and a
//! restart for the same destination resumes from the day after the last
//! processed date. Pause and cancel requests are observed between files.

use std::time::Instant;

use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parkpulse_collector::EntityResolver;
use parkpulse_core::quality;
use parkpulse_core::UpstreamSnapshot;
use parkpulse_upstream::{parse_archive_content, ArchiveObject, UpstreamError, WikiParksClient};

use crate::checkpoint::{self, ImportCheckpoint, ImportStatus};

/// First day the public archive has data for.
const DEFAULT_ARCHIVE_START: (i32, u32, u32) = (2021, 1, 1);

/// Result of a completed (or stopped) import.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportResult {
    pub import_id: Uuid,
    pub destination_uuid: String,
    pub records_imported: i64,
    pub errors_encountered: i32,
    pub files_processed: i32,
    pub duration_seconds: f64,
    pub status: String,
}

/// Imports historical data from the archive object store.
pub struct ArchiveImporter {
    pool: PgPool,
    client: WikiParksClient,
    resolver: Mutex<EntityResolver>,
    batch_size: usize,
    checkpoint_interval: usize,
}

impl ArchiveImporter {
    /// Create an importer.
    #[must_use]
    pub fn new(
        pool: PgPool,
        client: WikiParksClient,
        batch_size: usize,
        checkpoint_interval: usize,
        auto_create_entities: bool,
    ) -> Self {
        Self {
            pool,
            client,
            resolver: Mutex::new(EntityResolver::new(auto_create_entities)),
            batch_size: batch_size.max(1),
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    /// Import all data for a destination, resuming any existing checkpoint.
    pub async fn import_destination(
        &self,
        destination_uuid: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> anyhow::Result<ImportResult> {
        let started = Instant::now();

        // Resume or create the checkpoint
        let existing = checkpoint::get_resumable(&self.pool, destination_uuid).await?;
        let (cp, effective_start) = match existing {
            Some(cp) if cp.can_resume() => {
                let resume_from = cp.last_processed_date.map(|d| d + Duration::days(1));
                info!(
                    import_id = %cp.import_id,
                    resume_from = ?resume_from,
                    "Resuming archive import"
                );
                (cp, resume_from.or(start_date))
            }
            Some(cp) => {
                anyhow::bail!(
                    "import {} for {destination_uuid} is already {}",
                    cp.import_id,
                    cp.status
                );
            }
            None => {
                let cp = checkpoint::create(&self.pool, destination_uuid).await?;
                info!(import_id = %cp.import_id, destination_uuid, "Starting new archive import");
                (cp, start_date)
            }
        };

        let start = effective_start.unwrap_or_else(|| {
            let (y, m, d) = DEFAULT_ARCHIVE_START;
            NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| Utc::now().date_naive())
        });
        let end = end_date.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));

        let objects = WikiParksClient::list_archive_objects(destination_uuid, start, end);
        info!(files = objects.len(), %start, %end, "Archive objects to process");

        if objects.is_empty() {
            checkpoint::transition(&self.pool, cp.import_id, ImportStatus::InProgress).await?;
            checkpoint::transition(&self.pool, cp.import_id, ImportStatus::Completed).await?;
            return self.finish(cp.import_id, destination_uuid, started).await;
        }

        if !checkpoint::transition(&self.pool, cp.import_id, ImportStatus::InProgress).await? {
            anyhow::bail!("import {} cannot enter IN_PROGRESS", cp.import_id);
        }

        match self.process_objects(&cp, &objects).await {
            Ok(()) => {}
            Err(e) => {
                error!(import_id = %cp.import_id, error = %e, "Archive import failed");
                checkpoint::transition(&self.pool, cp.import_id, ImportStatus::Failed).await?;
                return Err(e);
            }
        }

        self.finish(cp.import_id, destination_uuid, started).await
    }

    async fn finish(
        &self,
        import_id: Uuid,
        destination_uuid: &str,
        started: Instant,
    ) -> anyhow::Result<ImportResult> {
        let cp = checkpoint::get(&self.pool, import_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("checkpoint {import_id} vanished"))?;

        Ok(ImportResult {
            import_id,
            destination_uuid: destination_uuid.to_string(),
            records_imported: cp.records_imported,
            errors_encountered: cp.errors_encountered,
            files_processed: cp.files_processed,
            duration_seconds: started.elapsed().as_secs_f64(),
            status: cp.status,
        })
    }

    /// Walk the object list in date order.
    async fn process_objects(
        &self,
        cp: &ImportCheckpoint,
        objects: &[ArchiveObject],
    ) -> anyhow::Result<()> {
        let mut batch: Vec<(i32, UpstreamSnapshot)> = Vec::with_capacity(self.batch_size);
        let mut batches_since_checkpoint = 0usize;
        let mut files_since_checkpoint = 0i32;
        let mut records_since_checkpoint = 0i64;

        for object in objects {
            // Honor pause/cancel requested from the admin surface
            if let Some(current) = checkpoint::get(&self.pool, cp.import_id).await? {
                match current.status() {
                    Some(ImportStatus::Paused | ImportStatus::Cancelled) => {
                        info!(
                            import_id = %cp.import_id,
                            status = %current.status,
                            "Import stopped by operator"
                        );
                        return Ok(());
                    }
                    _ => {}
                }
            }

            match self.process_object(cp, object, &mut batch).await {
                Ok(()) => files_since_checkpoint += 1,
                Err(UpstreamError::NotFound(_)) => {
                    // A day with no stored object; nothing to import
                    debug!(key = %object.key, "Archive object missing, skipping");
                    files_since_checkpoint += 1;
                }
                Err(e) => {
                    warn!(key = %object.key, error = %e, "Archive object failed");
                    checkpoint::record_error(&self.pool, cp.import_id).await?;
                    quality::log_issue(
                        &self.pool,
                        Some(cp.import_id),
                        e.issue_type(),
                        "archive_file",
                        &object.key,
                        &e.to_string(),
                    )
                    .await?;
                    files_since_checkpoint += 1;
                }
            }

            // Flush full batches, checkpointing every
            // `checkpoint_interval` batches
            while batch.len() >= self.batch_size {
                let chunk: Vec<_> = batch.drain(..self.batch_size).collect();
                records_since_checkpoint += self.save_batch(&chunk).await?;
                batches_since_checkpoint += 1;

                if batches_since_checkpoint % self.checkpoint_interval == 0 {
                    checkpoint::update_progress(
                        &self.pool,
                        cp.import_id,
                        object.date,
                        &object.key,
                        records_since_checkpoint,
                        files_since_checkpoint,
                    )
                    .await?;
                    records_since_checkpoint = 0;
                    files_since_checkpoint = 0;
                }
            }
        }

        // Final partial batch and trailing progress
        if !batch.is_empty() {
            records_since_checkpoint += self.save_batch(&batch).await?;
        }
        if let Some(last) = objects.last() {
            checkpoint::update_progress(
                &self.pool,
                cp.import_id,
                last.date,
                &last.key,
                records_since_checkpoint,
                files_since_checkpoint,
            )
            .await?;
        }

        checkpoint::transition(&self.pool, cp.import_id, ImportStatus::Completed).await?;
        info!(import_id = %cp.import_id, "Archive import complete");
        Ok(())
    }

    /// Fetch, parse, and resolve one object into the pending batch.
    async fn process_object(
        &self,
        cp: &ImportCheckpoint,
        object: &ArchiveObject,
        batch: &mut Vec<(i32, UpstreamSnapshot)>,
    ) -> Result<(), UpstreamError> {
        let content = self.client.fetch_archive_object(&object.key).await?;
        let outcome = parse_archive_content(&content)?;

        debug!(
            key = %object.key,
            events = outcome.events.len(),
            skipped = outcome.records_skipped,
            "Parsed archive object"
        );

        for event in outcome.events {
            let mut snapshot = event.to_upstream_snapshot();
            // Unknown status strings are stored as null, not invented
            snapshot.status = snapshot
                .status
                .filter(|s| parkpulse_core::RideStatus::parse(s).is_some());

            let ride_id = {
                let mut resolver = self.resolver.lock().await;
                let park_id = match resolver
                    .resolve_park(&self.pool, &snapshot.external_park_id)
                    .await
                {
                    Ok(Some(park_id)) => park_id,
                    Ok(None) => {
                        let _ = quality::log_issue(
                            &self.pool,
                            Some(cp.import_id),
                            "MAPPING_FAILED",
                            "park",
                            &snapshot.external_park_id,
                            &format!("Could not resolve park for event '{}'", snapshot.ride_name),
                        )
                        .await;
                        continue;
                    }
                    Err(e) => return Err(UpstreamError::Parse(e.to_string())),
                };

                match resolver
                    .resolve_ride(
                        &self.pool,
                        park_id,
                        snapshot.external_ride_id.as_deref(),
                        &snapshot.ride_name,
                    )
                    .await
                {
                    Ok(mapping) => mapping.ride_id,
                    Err(e) => return Err(UpstreamError::Parse(e.to_string())),
                }
            };

            match ride_id {
                Some(ride_id) => batch.push((ride_id, snapshot)),
                None => {
                    let _ = quality::log_issue(
                        &self.pool,
                        Some(cp.import_id),
                        "MAPPING_FAILED",
                        "ride",
                        snapshot.external_ride_id.as_deref().unwrap_or("-"),
                        &format!("Could not map entity: {}", snapshot.ride_name),
                    )
                    .await;
                }
            }
        }

        Ok(())
    }

    /// Persist one batch of archive snapshots in a single transaction.
    async fn save_batch(&self, batch: &[(i32, UpstreamSnapshot)]) -> anyhow::Result<i64> {
        let mut tx = self.pool.begin().await?;

        for (ride_id, snapshot) in batch {
            sqlx::query(
                r"
                INSERT INTO ride_status_snapshots
                    (ride_id, recorded_at, status, computed_is_open, wait_time, data_source)
                VALUES ($1, $2, $3, $4, $5, 'ARCHIVE')
                ",
            )
            .bind(ride_id)
            .bind(snapshot.timestamp)
            .bind(&snapshot.status)
            .bind(snapshot.park_open_hint.unwrap_or(false))
            .bind(snapshot.wait_time_minutes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(rows = batch.len(), "Saved archive batch");
        Ok(batch.len() as i64)
    }

    /// Pause a running import.
    pub async fn pause(&self, import_id: Uuid) -> anyhow::Result<bool> {
        Ok(checkpoint::transition(&self.pool, import_id, ImportStatus::Paused).await?)
    }

    /// Cancel an import.
    pub async fn cancel(&self, import_id: Uuid) -> anyhow::Result<bool> {
        Ok(checkpoint::transition(&self.pool, import_id, ImportStatus::Cancelled).await?)
    }
}
