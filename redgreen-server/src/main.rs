//! redgreen-server - Red-Green experiment backend
//!
//! Startup order: tracing, build identification, configuration, root
//! folder, database, slot report, HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use redgreen_common::config::{resolve_root_folder, ServerConfig, ROOT_FOLDER_ENV};
use redgreen_common::db::init_database;
use redgreen_common::time::now;
use redgreen_server::services::SessionManager;
use redgreen_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for redgreen-server
#[derive(Parser, Debug)]
#[command(name = "redgreen-server")]
#[command(about = "Backend for the Red-Green experiment")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "REDGREEN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database and trial data
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "REDGREEN_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redgreen_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Red-Green experiment server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    for (name, dataset) in &config.experiments {
        match config.dataset_dir(&root_folder, name) {
            Some(dir) if dir.is_dir() => info!("Experiment {} -> {}", name, dir.display()),
            _ => warn!("Experiment {}: dataset folder {} not found", name, dataset),
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .context("Invalid bind address")?;

    let state = AppState::new(pool, config, root_folder);

    let manager = SessionManager::new(state.db.clone(), state.config.clone(), state.catalog.clone());
    match manager.remaining_slots(now()).await {
        Ok(slots) => info!(
            remaining = slots.len(),
            max_slots = state.config.max_slots(),
            "Remaining profile slots: {:?}",
            slots
        ),
        Err(e) => warn!("Could not compute remaining profile slots: {}", e),
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("redgreen-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
