use axum::{extract::State, http::StatusCode, routing::get, Router};
use clap::Parser;
use datalens_navigator::{DataLensLayer, InMemoryCatalog, PoolManager};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Navigator(#[from] datalens_navigator::Error),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
struct ApplicationState {
    pools: Arc<PoolManager>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize logger
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let catalog = match &config.catalog {
        Some(path) => InMemoryCatalog::load(path)
            .await
            .map_err(datalens_navigator::Error::from)?,
        None => {
            warn!("no lens catalog configured, every lens lookup will return 404");
            InMemoryCatalog::new()
        }
    };

    let pools = Arc::new(PoolManager::new(
        config.connection_defaults(),
        config.pool_settings(),
    ));
    let application_state = ApplicationState {
        pools: pools.clone(),
    };

    // Note: DataLensLayer must be merged after with_state() since it returns a stateless Router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .with_state(application_state)
        .merge(DataLensLayer::postgres(config.base_path.clone(), pools.clone(), catalog).into_router())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            address: config.bind.clone(),
            source,
        })?;

    info!(address = %config.bind, base_path = %config.base_path, "navigator server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("shutting down, closing connection pools");
    pools.close_all().await;
    Ok(())
}

async fn root_handler() -> &'static str {
    "datalens navigator server"
}

/// Checks that the default connection is reachable
async fn health_handler(
    State(state): State<ApplicationState>,
) -> Result<(StatusCode, &'static str), StatusCode> {
    let resolved = state
        .pools
        .resolve(None)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    sqlx::query("SELECT 1")
        .execute(&resolved.connection)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok((StatusCode::OK, "Server is healthy"))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
