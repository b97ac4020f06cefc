use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

use config::{Config, Storage};
use repository::{MemoryRecipeRepository, PgRecipeRepository, SharedRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pillar_recipes=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid service configuration")?;
    config.validate()?;

    tracing::info!("Starting {}...", config.name);

    let repo: SharedRepository = match config.storage {
        Storage::Postgres => {
            tracing::info!(
                "Connecting to database {} at {}:{}...",
                config.database.name,
                config.database.host,
                config.database.port
            );

            let pool = db::create_pool(&config.database)
                .await
                .context("Failed to create database pool")?;

            if config.database.sync {
                db::run_migrations(&pool)
                    .await
                    .context("Failed to run database migrations")?;
            }

            Arc::new(PgRecipeRepository::new(pool))
        }
        Storage::Memory => {
            tracing::warn!("Using in-memory storage, recipes are lost on restart");
            Arc::new(MemoryRecipeRepository::new())
        }
    };

    let app = api::create_router(repo);

    let addr = config.bind_address();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
