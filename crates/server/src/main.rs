//! Coffer server binary.

use anyhow::{Context, Result};
use coffer_core::config::{AppConfig, DEFAULT_CONFIG_PATH};
use coffer_server::bootstrap::ensure_admin;
use coffer_server::{AppState, create_router, metrics};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Coffer - file and user management server
#[derive(Parser, Debug)]
#[command(name = "cofferd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (optional; COFFER_* variables override it)
    #[arg(short, long, env = "COFFER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Coffer v{}", env!("CARGO_PKG_VERSION"));

    if args.config.exists() {
        tracing::info!(config_path = %args.config.display(), "Loading configuration from file");
    } else {
        tracing::info!(
            config_path = %args.config.display(),
            "No config file found, using defaults and environment"
        );
    }
    let config = AppConfig::load(&args.config).context("failed to load configuration")?;

    metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let state = AppState::from_config(config)
        .await
        .context("failed to open stores")?;
    tracing::info!(backend = state.config.storage.kind(), "Stores opened");

    // Refuse to start against unreachable storage.
    for store in state.stores.blobs() {
        store
            .health_check()
            .await
            .with_context(|| format!("store {} failed its health check", store.name()))?;
        if store.is_locked().await.unwrap_or(false) {
            tracing::warn!(
                store = store.name(),
                "Store is locked at startup; clear a leaked lock with `cofferctl store unlock`"
            );
        }
    }
    tracing::info!("Store connectivity verified");

    ensure_admin(&state.services.users, state.config.admin.as_ref()).await?;

    let sweeper = state
        .services
        .maintenance
        .clone()
        .spawn(state.config.session.cleanup_interval(), metrics::record_sweep);

    let addr: SocketAddr = state
        .config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", state.config.server.bind))?;
    let app = create_router(state);

    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
