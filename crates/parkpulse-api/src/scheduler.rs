//! Background job scheduler.
//!
//! Runs the collection cycle, live rankings materialization, and rolling
//! hourly aggregation on the snapshot interval. Daily and weekly
//! aggregation fire once per day after Pacific midnight; the engine's own
//! log protocol makes reruns safe, so external cron can drive the same
//! entry points too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use tokio::time::interval;
use tracing::{error, info};

use parkpulse_collector::CollectionCycle;
use parkpulse_config::Settings;
use parkpulse_rankings::LiveRankingsMaterializer;
use parkpulse_stats::bounds::pacific_today;
use parkpulse_stats::Aggregator;
use parkpulse_upstream::{QueueTimesClient, WikiParksClient};

/// Handle used to stop the scheduler between cycles.
#[derive(Clone)]
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Request shutdown; the current cycle finishes first.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// The background job scheduler.
pub struct JobScheduler {
    pool: PgPool,
    settings: Settings,
}

impl JobScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        Self { pool, settings }
    }

    /// Start the scheduler as a background task.
    pub fn start(self) -> SchedulerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = SchedulerHandle {
            stop: Arc::clone(&stop),
        };

        let interval_minutes = self.settings.collector.snapshot_interval_minutes.max(1);

        tokio::spawn(async move {
            info!(
                interval_minutes,
                "Job scheduler started"
            );

            let client = QueueTimesClient::new(Some(
                self.settings.collector.upstream_timeout_secs,
            ));
            let wiki_client = WikiParksClient::new(
                self.settings.import.archive_base_url.clone(),
                Some(self.settings.collector.upstream_timeout_secs),
            );
            let cycle = CollectionCycle::new(
                self.pool.clone(),
                client,
                self.settings.collector.clone(),
            )
            .with_wiki_client(wiki_client);
            let materializer = LiveRankingsMaterializer::new(
                self.pool.clone(),
                self.settings.collector.live_window_hours,
                self.settings.collector.snapshot_interval_minutes,
            );
            let aggregator = Aggregator::new(
                self.pool.clone(),
                self.settings.collector.snapshot_interval_minutes,
            );

            let mut ticker = interval(Duration::from_secs(interval_minutes as u64 * 60));

            loop {
                ticker.tick().await;
                if stop.load(Ordering::SeqCst) {
                    info!("Job scheduler stopping");
                    break;
                }

                run_jobs(&cycle, &materializer, &aggregator).await;
            }
        });

        handle
    }
}

/// One scheduler tick: collect, keep today's hours fresh, materialize,
/// and catch up yesterday's daily/weekly rollups.
async fn run_jobs(
    cycle: &CollectionCycle,
    materializer: &LiveRankingsMaterializer,
    aggregator: &Aggregator,
) {
    if let Err(e) = cycle.run().await {
        error!(error = %e, "Collection cycle failed");
    }

    // Refresh today's hourly rows so the hybrid TODAY query stays fast.
    // Force is on: the day keeps accruing snapshots.
    let today_utc = chrono::Utc::now().date_naive();
    if let Err(e) = aggregator.run_hourly(today_utc, true).await {
        error!(error = %e, "Hourly aggregation failed");
    }
    // Early in the UTC day, yesterday's Pacific evening still maps to
    // the previous UTC date
    let prev_utc = today_utc - ChronoDuration::days(1);
    if let Err(e) = aggregator.run_hourly(prev_utc, true).await {
        error!(error = %e, "Hourly aggregation (previous UTC day) failed");
    }

    if let Err(e) = materializer.run().await {
        error!(error = %e, "Live rankings materialization failed");
    }

    // Daily + weekly for the completed Pacific day; the aggregation log
    // makes this a no-op once it has succeeded
    let yesterday = pacific_today() - ChronoDuration::days(1);
    match aggregator.run_daily(yesterday, None, false).await {
        Ok(_) => {
            if let Err(e) = aggregator.run_weekly(yesterday, false).await {
                error!(error = %e, "Weekly aggregation failed");
            }
        }
        Err(e) => error!(error = %e, "Daily aggregation failed"),
    }
}
