//! Warden Server - Main Entry Point
//!
//! Object-level permission service backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use warden_server::config::{Config, StoreBackend};
use warden_server::permissions::{
    AssignmentStore, Authorizer, GroupMembership, MemoryAssignmentStore, PgAssignmentStore,
    PgGroupMembership, Schema, SchemaDefinition, StaticMembership,
};
use warden_server::{api, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.store_backend,
        "Starting Warden Server"
    );

    // Build the permission schema; a duplicate type or codename is fatal
    let definition = match &config.schema_file {
        Some(path) => SchemaDefinition::from_file(path)?,
        None => SchemaDefinition::builtin(),
    };
    let schema = Arc::new(Schema::build(&definition).context("Invalid permission schema")?);

    let (store, membership): (Arc<dyn AssignmentStore>, Arc<dyn GroupMembership>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set")?;
                let db_pool = db::create_pool(database_url).await?;
                db::run_migrations(&db_pool).await?;
                db::sync_schema(&db_pool, &schema).await?;

                (
                    Arc::new(PgAssignmentStore::new(db_pool.clone(), schema.clone())),
                    Arc::new(PgGroupMembership::new(db_pool)),
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory assignment store; assignments are lost on restart");
                (
                    Arc::new(MemoryAssignmentStore::new()),
                    Arc::new(StaticMembership::new()),
                )
            }
        };

    // Build application state
    let authz = Authorizer::new(schema, store, membership);
    let state = api::AppState::new(authz, config.clone());

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
