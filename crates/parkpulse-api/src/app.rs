//! Application setup and configuration.
//!
//! Creates the Axum router with all routes and middleware, the database
//! pool, and the background job scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use parkpulse_config::Settings;
use parkpulse_core::AppCache;
use parkpulse_importer::ArchiveImporter;
use parkpulse_upstream::WikiParksClient;

use crate::routes;
use crate::scheduler::JobScheduler;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Application settings
    pub settings: Arc<Settings>,
    /// Query result caches
    pub cache: AppCache,
    /// Archive importer shared with the admin surface
    pub importer: Arc<ArchiveImporter>,
}

/// Create the Axum application with all routes and middleware.
///
/// Returns the router and the job scheduler to start as a background task.
pub async fn create_app(settings: Settings) -> Result<(Router, JobScheduler)> {
    // Create database connection pool
    let db = create_db_pool(&settings).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;
    info!("Migrations complete");

    let wiki_client = WikiParksClient::new(
        settings.import.archive_base_url.clone(),
        Some(settings.collector.upstream_timeout_secs),
    );
    let importer = Arc::new(ArchiveImporter::new(
        db.clone(),
        wiki_client,
        settings.import.batch_size,
        settings.import.checkpoint_interval,
        settings.collector.auto_create_rides,
    ));

    let job_scheduler = JobScheduler::new(db.clone(), settings.clone());

    // Create shared state
    let state = AppState {
        db,
        settings: Arc::new(settings),
        cache: AppCache::new(),
        importer,
    };

    // Build the router
    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::rankings::router())
        .merge(routes::parks::router())
        .merge(routes::charts::router())
        .merge(routes::heatmap::router())
        .merge(routes::admin::router())
        .merge(routes::api_docs())
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                // Tracing for all requests
                .layer(TraceLayer::new_for_http())
                // Response compression
                .layer(CompressionLayer::new())
                // CORS configuration
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        );

    Ok((app, job_scheduler))
}

/// Create the database connection pool.
async fn create_db_pool(settings: &Settings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(settings.database.url.expose_secret())
        .await
        .context("Failed to connect to database")?;

    info!(
        "Database pool created (max: {}, min: {})",
        settings.database.max_connections, settings.database.min_connections
    );

    Ok(pool)
}
