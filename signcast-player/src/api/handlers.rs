//! HTTP request handlers
//!
//! The rendering surface drives playback through the pane report endpoints
//! and listens on `/events`; everything else is operator tooling.

use crate::api::AppState;
use crate::db;
use crate::sync::cache;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use signcast_common::model::MediaAsset;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: String,
    pub current_asset: Option<String>,
    pub blocked: bool,
    pub online: bool,
    pub device_id: String,
    pub device_name: String,
    pub catalog_assets: i64,
    pub queue_length: usize,
    pub queue_position: usize,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub assets: Vec<MediaAsset>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: String,
}

fn ack() -> Json<AckResponse> {
    Json(AckResponse {
        status: "ok".to_string(),
    })
}

/// GET /api/v1/status - device, catalog and playback state
pub async fn get_status(
    State(app): State<AppState>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let (device_id, device_name) = app.state.get_device_identity().await;
    let catalog_assets = db::catalog::count_assets(&app.db).await.map_err(|e| {
        error!("Failed to count catalog assets: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let (queue_length, queue_position) = app.scheduler.queue_status().await;

    Ok(Json(StatusResponse {
        phase: app.state.get_scheduler_phase().await.to_string(),
        current_asset: app.state.get_current_asset().await,
        blocked: app.state.is_blocked(),
        online: app.state.is_online(),
        device_id,
        device_name,
        catalog_assets,
        queue_length,
        queue_position,
    }))
}

/// GET /api/v1/catalog - the catalog as playback sees it
///
/// Local paths that fail the on-disk check are reported as absent, exactly
/// as the scheduler would treat them.
pub async fn get_catalog(
    State(app): State<AppState>,
) -> Result<Json<CatalogResponse>, StatusCode> {
    let assets = cache::effective_catalog(&app.db).await.map_err(|e| {
        error!("Failed to load catalog: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(CatalogResponse { assets }))
}

/// POST /api/v1/playback/advance - skip to the next asset
pub async fn advance(State(app): State<AppState>) -> Json<AckResponse> {
    info!("Advance requested over the control API");
    app.scheduler.advance().await;
    ack()
}

/// POST /api/v1/playback/pane/:pane/completed - pane finished its source
pub async fn pane_completed(
    State(app): State<AppState>,
    Path(pane): Path<usize>,
) -> Json<AckResponse> {
    app.scheduler.pane_completed(pane).await;
    ack()
}

/// POST /api/v1/playback/pane/:pane/errored - pane failed its source
pub async fn pane_errored(
    State(app): State<AppState>,
    Path(pane): Path<usize>,
) -> Json<AckResponse> {
    app.scheduler.pane_errored(pane).await;
    ack()
}

/// POST /api/v1/sync/refresh - fetch and apply the catalog now
pub async fn refresh(State(app): State<AppState>) -> Json<AckResponse> {
    info!("Catalog refresh requested over the control API");
    app.sync.fetch_and_apply();
    ack()
}

/// POST /api/v1/sync/verify - run a verification sweep now
pub async fn verify(State(app): State<AppState>) -> Json<AckResponse> {
    info!("Verification sweep requested over the control API");
    app.sync.verify();
    ack()
}
