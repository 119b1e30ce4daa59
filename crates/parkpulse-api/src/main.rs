//! ParkPulse API Server
//!
//! Main entry point for the Axum web server and the background job
//! scheduler (collection, live materialization, aggregation).

use anyhow::Result;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod routes;
mod scheduler;

/// Wait for shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C (SIGINT), initiating graceful shutdown...");
                Ok(())
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await?;
        info!("Received Ctrl+C (SIGINT), initiating graceful shutdown...");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,parkpulse_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ParkPulse API Server");

    // Load configuration
    let settings = parkpulse_config::Settings::from_env()?;
    let addr = settings.server_addr();

    info!("Database: {}", settings.database.url_masked());
    info!("Listening on: http://{}", addr);

    // Build the application (returns router and the job scheduler)
    let (app, job_scheduler) = app::create_app(settings.clone()).await?;

    // Start collection/materialization jobs in the background
    let scheduler_handle = job_scheduler.start();

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        shutdown_timeout_secs = settings.server.shutdown_timeout_secs,
        "Starting server with graceful shutdown"
    );

    let handle_clone = scheduler_handle.clone();
    let settings_clone = settings.clone();

    let shutdown_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let shutdown_start = Instant::now();
            let timeout_duration =
                Duration::from_secs(settings_clone.server.shutdown_timeout_secs);

            match timeout(timeout_duration, shutdown_signal()).await {
                Ok(Ok(())) => {
                    info!("Shutdown signal received, initiating graceful shutdown...");
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Error waiting for shutdown signal");
                    info!("Forcing shutdown due to signal handler error...");
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = settings_clone.server.shutdown_timeout_secs,
                        "Shutdown timeout reached while waiting for signal, forcing shutdown"
                    );
                }
            }

            // Signal the job scheduler to stop between cycles
            handle_clone.shutdown();
            info!("Signaled job scheduler to shutdown");

            let shutdown_duration = shutdown_start.elapsed();
            info!(
                shutdown_duration_ms = shutdown_duration.as_millis(),
                "Graceful shutdown completed"
            );
        })
        .await;

    match shutdown_result {
        Ok(()) => {
            info!("Server shut down successfully");
        }
        Err(e) => {
            tracing::error!(error = %e, "Error during server shutdown");
            return Err(anyhow::anyhow!("Server shutdown error: {}", e));
        }
    }

    Ok(())
}
