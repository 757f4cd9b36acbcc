//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        CloudinaryBlobStore, DbAdapter, HttpWorkerDispatcher, LoggingDispatcher,
        UnconfiguredBlobStore,
    },
    config::Config,
    error::ApiError,
    web::{router, rest::ApiDoc, AppState},
};
use neurostudy_core::{BlobStore, ProcessingDispatcher};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

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

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::new();

    let blobs: Arc<dyn BlobStore> = match &config.cloudinary {
        Some(cloudinary) => {
            info!("Storing uploads in Cloudinary cloud '{}'", cloudinary.cloud_name);
            Arc::new(CloudinaryBlobStore::new(http_client.clone(), cloudinary.clone()))
        }
        None => {
            warn!("Cloudinary credentials are not set; uploads will fail");
            Arc::new(UnconfiguredBlobStore)
        }
    };

    let dispatcher: Arc<dyn ProcessingDispatcher> = match &config.ai_worker_url {
        Some(url) => {
            let worker = HttpWorkerDispatcher::new(http_client, url);
            info!("Processing requests go to {}", worker.endpoint());
            Arc::new(worker)
        }
        None => {
            warn!("AI_WORKER_URL is not set; processing requests are only logged");
            Arc::new(LoggingDispatcher)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(config.clone(), db_adapter, blobs, dispatcher)?);

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

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
