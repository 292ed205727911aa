//! Control API
//!
//! Local REST surface for the rendering surface and for operators: status
//! and catalog inspection, playback reports, sync triggers and the SSE
//! event stream.

pub mod handlers;
pub mod sse;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::playback::scheduler::PlaybackScheduler;
use crate::state::SharedState;
use crate::sync::orchestrator::SyncHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub state: Arc<SharedState>,
    pub scheduler: PlaybackScheduler,
    pub sync: SyncHandle,
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Status and catalog inspection
                .route("/status", get(handlers::get_status))
                .route("/catalog", get(handlers::get_catalog))
                // Playback reports from the rendering surface
                .route("/playback/advance", post(handlers::advance))
                .route(
                    "/playback/pane/:pane/completed",
                    post(handlers::pane_completed),
                )
                .route("/playback/pane/:pane/errored", post(handlers::pane_errored))
                // Sync triggers
                .route("/sync/refresh", post(handlers::refresh))
                .route("/sync/verify", post(handlers::verify))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .with_state(state)
        // Request logging for the local surface
        .layer(TraceLayer::new_for_http())
        // The rendering surface may load from a file:// origin
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "signcast-player",
        "version": env!("CARGO_PKG_VERSION"),
        "port": app.port,
    }))
}
