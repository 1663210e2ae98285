//! redgreen-server library - Red-Green experiment backend
//!
//! Serves the trial sequence of the Red-Green experiment and records each
//! participant's per-frame responses in SQLite.

use axum::Router;
use redgreen_common::config::ServerConfig;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod experiment;
pub mod services;

use experiment::ExperimentCatalog;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ServerConfig>,
    /// Read-only trial datasets
    pub catalog: Arc<ExperimentCatalog>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServerConfig, root_folder: PathBuf) -> Self {
        let config = Arc::new(config);
        let catalog = Arc::new(ExperimentCatalog::new(root_folder, Arc::clone(&config)));
        Self { db, config, catalog }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/start_experiment/:experiment_name", post(api::start_experiment))
        .route("/load_next_scene", post(api::load_next_scene))
        .route("/save_data", post(api::save_data))
        .route("/end_session", post(api::end_session))
        .route("/check_timeout", post(api::check_timeout))
        .route("/sessions", get(api::list_sessions))
        .route("/sessions/:id/ignore", post(api::set_ignore))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
