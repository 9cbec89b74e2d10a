//! ReelRecs HTTP server.
//!
//! Loads the trained model and tables, then serves recommendations until
//! interrupted. Any structural problem in the persisted data stops startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use data_loader::Dataset;
use server::{RecommendationService, ServerSettings};

#[derive(Parser)]
#[command(name = "reel-recs-server")]
#[command(about = "Serve latent-factor movie recommendations over HTTP", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: ServerSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let settings = Cli::parse().settings;
    let config = settings.service_config().context("Invalid service configuration")?;
    let addr = settings.socket_addr()?;

    info!(
        "Loading model from {} and tables from {}",
        settings.model_dir.display(),
        settings.processed_dir.display()
    );
    let source = settings.source();
    let dataset = Dataset::load(&source, &source, &source)
        .context("Failed to load the model and data tables")?;

    let service = Arc::new(
        RecommendationService::new(Arc::new(dataset), config)
            .context("Failed to start the recommendation service")?,
    );
    info!(
        "Serving {} users and {} items with {:?}",
        service.user_count(),
        service.item_count(),
        service.config()
    );

    if let Some(secs) = settings.interactions_refresh_secs.filter(|&secs| secs > 0) {
        spawn_interaction_refresh(Arc::clone(&service), source, Duration::from_secs(secs));
    }

    let app = server::router(service, &settings.cors_origins());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Periodically re-read the ratings table and swap in a fresh interaction index
fn spawn_interaction_refresh(
    service: Arc<RecommendationService>,
    source: data_loader::FileSystemSource,
    every: Duration,
) {
    let source = Arc::new(source);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; the index was just loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let service = Arc::clone(&service);
            let source = Arc::clone(&source);
            match tokio::task::spawn_blocking(move || service.reload_interactions(source.as_ref()))
                .await
            {
                Ok(Ok(count)) => info!("Refreshed interactions: {} records", count),
                Ok(Err(e)) => error!("Interaction refresh failed, keeping current index: {}", e),
                Err(e) => error!("Interaction refresh task failed: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
