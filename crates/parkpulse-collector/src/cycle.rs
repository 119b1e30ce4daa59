//! Collection cycle orchestration.
//!
//! One cycle fetches every tracked park with a bounded worker pool. A
//! park failure is contained: the quality log gets a row and the cycle
//! moves on. All snapshots in the cycle share one `recorded_at`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Utc};
use sqlx::PgPool;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use parkpulse_config::CollectorSettings;
use parkpulse_core::types::Park;
use parkpulse_core::{quality, DataSource, UpstreamSnapshot};
use parkpulse_upstream::{QueueTimesClient, WikiParksClient};

use crate::resolver::EntityResolver;
use crate::writer::{write_park_cycle, ResolvedRide};

/// Outcome counters for one collection cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub parks_processed: u32,
    pub parks_failed: u32,
    pub snapshots_written: u32,
    pub mapping_failures: u32,
    pub status_changes: u32,
}

/// Runs the per-cycle collection across all tracked parks.
pub struct CollectionCycle {
    pool: PgPool,
    client: QueueTimesClient,
    wiki_client: Option<WikiParksClient>,
    settings: CollectorSettings,
    resolver: Arc<Mutex<EntityResolver>>,
}

impl CollectionCycle {
    /// Create a cycle runner.
    #[must_use]
    pub fn new(pool: PgPool, client: QueueTimesClient, settings: CollectorSettings) -> Self {
        let resolver = Arc::new(Mutex::new(EntityResolver::new(settings.auto_create_rides)));
        Self {
            pool,
            client,
            wiki_client: None,
            settings,
            resolver,
        }
    }

    /// Also reconcile explicit statuses from the wiki source for parks
    /// that have a wiki entity id.
    #[must_use]
    pub fn with_wiki_client(mut self, client: WikiParksClient) -> Self {
        self.wiki_client = Some(client);
        self
    }

    /// Run one full collection cycle.
    pub async fn run(&self) -> anyhow::Result<CycleOutcome> {
        // Shared timestamp for every row written this cycle
        let recorded_at = Utc::now()
            .duration_trunc(chrono::Duration::seconds(1))
            .unwrap_or_else(|_| Utc::now());

        let parks = self.load_active_parks().await?;
        info!(parks = parks.len(), %recorded_at, "Starting collection cycle");

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_parks.max(1)));
        let outcome = Arc::new(Mutex::new(CycleOutcome::default()));

        let mut handles = Vec::with_capacity(parks.len());
        for park in parks {
            let permit_source = Arc::clone(&semaphore);
            let outcome = Arc::clone(&outcome);
            let pool = self.pool.clone();
            let client = self.client.clone();
            let wiki_client = self.wiki_client.clone();
            let resolver = Arc::clone(&self.resolver);
            let settings = self.settings.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = permit_source.acquire().await else {
                    return;
                };

                let budget = Duration::from_secs(settings.park_budget_secs);
                let result = tokio::time::timeout(
                    budget,
                    process_park(
                        &pool,
                        &client,
                        wiki_client.as_ref(),
                        &resolver,
                        &settings,
                        &park,
                        recorded_at,
                    ),
                )
                .await;

                let mut outcome = outcome.lock().await;
                match result {
                    Ok(Ok(park_result)) => {
                        outcome.parks_processed += 1;
                        outcome.snapshots_written += park_result.snapshots_written;
                        outcome.mapping_failures += park_result.mapping_failures;
                        outcome.status_changes += park_result.status_changes;
                    }
                    Ok(Err(e)) => {
                        outcome.parks_failed += 1;
                        error!(park = %park.name, error = %e, "Park collection failed");
                        log_park_failure(&pool, &park, &e.to_string()).await;
                    }
                    Err(_) => {
                        outcome.parks_failed += 1;
                        warn!(
                            park = %park.name,
                            budget_secs = settings.park_budget_secs,
                            "Park collection exceeded budget"
                        );
                        log_park_failure(
                            &pool,
                            &park,
                            &format!("budget of {}s exceeded", settings.park_budget_secs),
                        )
                        .await;
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let outcome = *outcome.lock().await;
        let mapping_stats = self.resolver.lock().await.stats();
        info!(
            parks_processed = outcome.parks_processed,
            parks_failed = outcome.parks_failed,
            snapshots = outcome.snapshots_written,
            mapping_failures = outcome.mapping_failures,
            fuzzy_matches = mapping_stats.fuzzy_name,
            cache_hits = mapping_stats.cache_hits,
            "Collection cycle complete"
        );
        Ok(outcome)
    }

    /// Active parks, optionally restricted to one country.
    async fn load_active_parks(&self) -> Result<Vec<Park>, sqlx::Error> {
        match self.settings.filter_country.as_deref() {
            Some(country) => {
                sqlx::query_as::<_, Park>(
                    "SELECT * FROM parks WHERE is_active = TRUE AND country = $1 ORDER BY park_id",
                )
                .bind(country)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Park>(
                    "SELECT * FROM parks WHERE is_active = TRUE ORDER BY park_id",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
    }
}

/// Per-park counters.
struct ParkResult {
    snapshots_written: u32,
    mapping_failures: u32,
    status_changes: u32,
}

/// Fetch, resolve, and persist one park.
async fn process_park(
    pool: &PgPool,
    client: &QueueTimesClient,
    wiki_client: Option<&WikiParksClient>,
    resolver: &Mutex<EntityResolver>,
    settings: &CollectorSettings,
    park: &Park,
    recorded_at: DateTime<Utc>,
) -> Result<ParkResult, anyhow::Error> {
    let snapshots = client.fetch_current(park.queue_times_id).await?;

    let mut resolved: Vec<ResolvedRide> = Vec::with_capacity(snapshots.len());
    let mut mapping_failures = 0u32;

    // Tier lookup for the whole park in one query
    let tiers: Vec<(i32, Option<i32>)> =
        sqlx::query_as("SELECT ride_id, tier FROM rides WHERE park_id = $1")
            .bind(park.park_id)
            .fetch_all(pool)
            .await?;
    let tiers: std::collections::HashMap<i32, Option<i32>> = tiers.into_iter().collect();

    for snapshot in snapshots {
        if is_single_rider(&snapshot) {
            // Single Rider queues open and close independently and would
            // read as false downtime
            continue;
        }

        let mapping = {
            let mut resolver = resolver.lock().await;
            resolver
                .resolve_ride(
                    pool,
                    park.park_id,
                    snapshot.external_ride_id.as_deref(),
                    &snapshot.ride_name,
                )
                .await?
        };

        match mapping.ride_id {
            Some(ride_id) => resolved.push(ResolvedRide {
                ride_id,
                tier: tiers.get(&ride_id).copied().flatten(),
                status: snapshot.status.clone(),
                open_hint: snapshot.park_open_hint,
                wait_time: snapshot.wait_time_minutes,
            }),
            None => {
                mapping_failures += 1;
                let _ = quality::log_issue(
                    pool,
                    None,
                    "MAPPING_FAILED",
                    "ride",
                    snapshot.external_ride_id.as_deref().unwrap_or("-"),
                    &format!("Could not map ride '{}' in park {}", snapshot.ride_name, park.name),
                )
                .await;
            }
        }
    }

    if resolved.is_empty() {
        warn!(park = %park.name, "No resolvable rides this cycle");
        return Ok(ParkResult {
            snapshots_written: 0,
            mapping_failures,
            status_changes: 0,
        });
    }

    // Reconcile explicit statuses from the wiki source. Queue-Times only
    // has an open flag; the wiki reports DOWN vs CLOSED vs REFURBISHMENT.
    if let (Some(wiki), Some(wiki_park_id)) = (wiki_client, park.wiki_entity_id.as_deref()) {
        match wiki.fetch_current(wiki_park_id).await {
            Ok(wiki_snapshots) => {
                overlay_wiki_statuses(pool, resolver, park, &mut resolved, wiki_snapshots).await?;
            }
            Err(e) => {
                warn!(park = %park.name, error = %e, "Wiki live fetch failed, keeping heuristic statuses");
            }
        }
    }

    let summary = write_park_cycle(
        pool,
        park,
        &resolved,
        recorded_at,
        None,
        settings.park_open_min_rides,
        DataSource::Live,
    )
    .await?;

    Ok(ParkResult {
        snapshots_written: resolved.len() as u32,
        mapping_failures,
        status_changes: summary.status_changes as u32,
    })
}

/// Overlay wiki statuses onto the resolved ride list. An explicit status
/// always beats the open-flag heuristic.
async fn overlay_wiki_statuses(
    pool: &PgPool,
    resolver: &Mutex<EntityResolver>,
    park: &Park,
    resolved: &mut [ResolvedRide],
    wiki_snapshots: Vec<UpstreamSnapshot>,
) -> Result<u32, anyhow::Error> {
    let mut overlaid = 0u32;

    for wiki_snapshot in wiki_snapshots {
        let Some(status) = wiki_snapshot.status.clone() else {
            continue;
        };

        let mapping = {
            let mut resolver = resolver.lock().await;
            resolver
                .resolve_ride(
                    pool,
                    park.park_id,
                    wiki_snapshot.external_ride_id.as_deref(),
                    &wiki_snapshot.ride_name,
                )
                .await?
        };

        if let Some(ride_id) = mapping.ride_id {
            if let Some(entry) = resolved.iter_mut().find(|r| r.ride_id == ride_id) {
                entry.status = Some(status);
                if entry.wait_time.is_none() {
                    entry.wait_time = wiki_snapshot.wait_time_minutes;
                }
                overlaid += 1;
            }
        }
    }

    if overlaid > 0 {
        debug!(park = %park.name, overlaid, "Overlaid wiki statuses");
    }
    Ok(overlaid)
}

fn is_single_rider(snapshot: &UpstreamSnapshot) -> bool {
    snapshot.ride_name.to_lowercase().contains("single rider")
}

async fn log_park_failure(pool: &PgPool, park: &Park, message: &str) {
    let issue_type = if message.contains("parse") || message.contains("Parse") {
        "PARSE_ERROR"
    } else {
        "TRANSPORT_ERROR"
    };
    if let Err(e) = quality::log_issue(
        pool,
        None,
        issue_type,
        "park",
        &park.queue_times_id.to_string(),
        message,
    )
    .await
    {
        error!(park = %park.name, error = %e, "Failed to write quality log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> UpstreamSnapshot {
        UpstreamSnapshot {
            external_park_id: "1".into(),
            external_ride_id: Some("100".into()),
            ride_name: name.into(),
            timestamp: Utc::now(),
            status: None,
            wait_time_minutes: Some(5),
            park_open_hint: Some(true),
        }
    }

    #[test]
    fn test_single_rider_lines_are_skipped() {
        assert!(is_single_rider(&snapshot("Hagrid's - Single Rider")));
        assert!(is_single_rider(&snapshot("single rider line")));
        assert!(!is_single_rider(&snapshot("Hagrid's Magical Creatures")));
    }
}
