use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use course_funnel_api::{
    app::{create_app, AppState},
    config::Config,
    middleware,
    services::{EmailService, EventBusPublisher},
};
use persistence::repositories::RegistrationRepository;

/// How often pool gauges are sampled and idle rate-limit entries dropped.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    middleware::init_metrics().context("Failed to install Prometheus recorder")?;

    info!("Starting course funnel API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database_config()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let store = Arc::new(RegistrationRepository::new(pool.clone()));
    let mailer = Arc::new(EmailService::new(config.email.clone())?);
    let publisher = Arc::new(EventBusPublisher::new(&config.event_bus)?);

    let addr = config
        .socket_addr()
        .context("Invalid server.host / server.port")?;

    let state = AppState::new(config, store, mailer, publisher);
    let rate_limiter = state.rate_limiter.clone();
    let app = create_app(state);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            ticker.tick().await;
            persistence::metrics::record_pool_metrics(&pool);
            if let Some(limiter) = &rate_limiter {
                limiter.prune();
            }
        }
    });

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
