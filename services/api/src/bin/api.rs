//! services/api/src/bin/api.rs

use std::sync::Arc;

use api_lib::{
    adapters::{DocumentStore, PgStore},
    config::Config,
    error::ApiError,
    web::{self, AppState, Stores},
};
use sqlx::postgres::PgPoolOptions;
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
    info!(?config, "Configuration loaded. Starting server...");

    let permissions = config.role_permissions()?;
    info!(roles = permissions.role_count(), "Role permission table loaded.");

    // --- 2. Connect to Both Stores & Run Migrations ---
    info!("Connecting to relational database...");
    let relational_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await?;
    let pg_store = Arc::new(PgStore::new(relational_pool));

    info!("Connecting to document database...");
    let document_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout)
        .connect(&config.document_database_url)
        .await?;
    let document_store = Arc::new(DocumentStore::new(document_pool));

    info!("Running database migrations...");
    pg_store.run_migrations().await?;
    document_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        permissions,
        Stores {
            identities: pg_store.clone(),
            students: pg_store.clone(),
            references: pg_store,
            details: document_store,
        },
    ));

    // --- 4. Start the Server ---
    let app = web::router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
