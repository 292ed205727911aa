//! signcast Player - Main entry point
//!
//! Boots the device agent: database and identity, cached-catalog playback,
//! upstream registration with REST fallback, and the local control API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signcast_player::api;
use signcast_player::config::Config;
use signcast_player::db;
use signcast_player::net::catalog::CatalogFetcher;
use signcast_player::net::connectivity::Connectivity;
use signcast_player::net::download::AssetDownloader;
use signcast_player::playback::scheduler::PlaybackScheduler;
use signcast_player::state::SharedState;
use signcast_player::sync::cache;
use signcast_player::sync::orchestrator::{self, SyncEngine, NETWORK_POLL_INTERVAL};

/// Command-line arguments for signcast-player
#[derive(Parser, Debug)]
#[command(name = "signcast-player")]
#[command(about = "Unattended signage playback agent")]
#[command(version)]
struct Args {
    /// Port for the local control API
    #[arg(short, long, default_value = "5748", env = "SIGNCAST_PORT")]
    port: u16,

    /// Data folder for the database and media cache
    #[arg(short, long, env = "SIGNCAST_DATA_DIR")]
    data_folder: Option<String>,

    /// Upstream registration socket URL
    #[arg(long, env = "SIGNCAST_WS_URL")]
    ws_url: Option<String>,

    /// Upstream catalog REST base URL
    #[arg(long, env = "SIGNCAST_API_URL")]
    api_url: Option<String>,

    /// Seconds between cache verification sweeps
    #[arg(long, env = "SIGNCAST_VERIFY_INTERVAL")]
    verify_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signcast_player=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting signcast player v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        args.port
    );

    let config = Config::resolve(
        args.data_folder.as_deref(),
        args.port,
        args.ws_url,
        args.api_url,
        args.verify_interval_secs,
    )
    .context("Failed to resolve configuration")?;

    info!("Data folder: {}", config.data_folder.display());
    info!("Upstream: {} / {}", config.upstream_ws_url, config.upstream_api_url);

    std::fs::create_dir_all(&config.media_dir).context("Failed to create media directory")?;

    let pool = signcast_common::db::init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;

    // Device identity survives restarts via the settings table
    let device_id = db::settings::get_or_create_device_id(&pool)
        .await
        .context("Failed to resolve device id")?;
    let device_name = db::settings::get_or_create_device_name(&pool)
        .await
        .context("Failed to resolve device name")?;
    info!("Device identity: {} ({})", device_id, device_name);

    let state = Arc::new(SharedState::new());
    state
        .set_device_identity(device_id.clone(), device_name.clone())
        .await;

    // Sweep before first use so playback never starts on a bad cache
    match cache::verify_saved_files(&pool).await {
        Ok(cleared) if cleared > 0 => info!("Startup sweep cleared {} cached paths", cleared),
        Ok(_) => {}
        Err(e) => warn!("Startup verification sweep failed: {}", e),
    }

    let connectivity = Connectivity::from_url(&config.upstream_api_url);
    if connectivity.is_none() {
        warn!(
            "Cannot derive a reachability probe from {}",
            config.upstream_api_url
        );
    }

    let downloader = AssetDownloader::new(config.media_dir.clone(), connectivity.clone())
        .context("Failed to build downloader")?;
    let fetcher = CatalogFetcher::new(&config.upstream_api_url, connectivity.clone())
        .context("Failed to build catalog fetcher")?;

    let scheduler = PlaybackScheduler::new(pool.clone(), state.clone());
    let (engine, sync) = SyncEngine::new(
        pool.clone(),
        state.clone(),
        scheduler.clone(),
        downloader,
        fetcher,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    tokio::spawn(engine.run());
    tokio::spawn(orchestrator::route_registration_signals(
        signal_rx,
        state.clone(),
        scheduler.clone(),
        sync.clone(),
    ));
    tokio::spawn(orchestrator::supervise_registration(
        config.upstream_ws_url.clone(),
        state.clone(),
        connectivity.clone(),
        signal_tx,
        shutdown_rx.clone(),
        NETWORK_POLL_INTERVAL,
    ));
    tokio::spawn(orchestrator::run_verify_timer(
        sync.clone(),
        Duration::from_secs(config.verify_interval_secs),
        shutdown_rx.clone(),
    ));

    // Play from the cached catalog while registration is still connecting
    let cached = db::catalog::count_assets(&pool).await.unwrap_or(0);
    if cached > 0 {
        info!("Starting playback from {} cached assets", cached);
        scheduler.start().await;
    } else {
        info!("No cached catalog yet, waiting for upstream");
    }

    let app_state = api::AppState {
        db: pool,
        state,
        scheduler,
        sync,
        port: config.port,
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting control API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the background tasks
    let _ = shutdown_tx.send(true);
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
