use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod health;
pub mod metrics;
pub mod pncp;
pub mod routes;
pub mod utils;

use auth::AuthManager;
use config::Config;
use context::AppContext;
use pncp::PncpClient;

pub async fn run() -> Result<()> {
    // Load configuration first so RUST_LOG from .env applies to tracing
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = Arc::new(config);

    let bind_address = format!("0.0.0.0:{}", app_config.port);

    // Connect to database
    let db_pool = Arc::new(db::create_pool(&app_config).await?);
    tracing::info!("Connected to database");

    // Apply database migrations
    tracing::info!("Applying database migrations...");
    sqlx::migrate!().run(&*db_pool).await?;
    tracing::info!("Database migrations applied successfully.");

    let auth_manager = Arc::new(AuthManager::new(&app_config)?);
    let pncp_client = Arc::new(PncpClient::new(&app_config)?);

    // Create application context
    let app_context = Arc::new(AppContext::new(
        db_pool,
        auth_manager,
        pncp_client,
        app_config.clone(),
    ));

    let app = routes::create_router(app_context);

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!("PNCP Tracker API listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down.");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received. Shutting down...");
}
