//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GoogleBooksAdapter, LocalFileStorage, LogEventPublisher, WebhookEventPublisher},
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use bookflow_core::ports::{EventPublisher, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Collaborator Adapters ---
    let storage = LocalFileStorage::new(&config.storage_root);
    storage.ensure_root().await?;
    info!("Storing book files under {}", config.storage_root.display());

    let timeout = Duration::from_secs(config.metadata_timeout_secs);
    let metadata = GoogleBooksAdapter::new(config.google_books_api_url.clone(), timeout)?;

    let events: Arc<dyn EventPublisher> = match &config.events_webhook_url {
        Some(url) => {
            info!("Publishing events to {}", url);
            Arc::new(
                WebhookEventPublisher::new(url.clone(), timeout)
                    .map_err(|e| ApiError::Internal(format!("Failed to build webhook client: {}", e)))?,
            )
        }
        None => {
            info!("EVENTS_WEBHOOK_URL not set; events are logged only");
            Arc::new(LogEventPublisher)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        db_adapter,
        Arc::new(storage),
        Arc::new(metadata),
        events,
        Arc::new(SystemClock),
        config.clone(),
    ));

    // --- 5. Create the Web Router ---
    let app = router(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
