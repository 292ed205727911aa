//! Read-side catalog resolution and cache maintenance
//!
//! The persisted catalog stores both a remote URL and an optional local
//! path per source. What actually plays is decided at read time: a local
//! path is only offered if the file is still there and big enough to be a
//! real transfer. The heavier decodability probe runs in the periodic
//! verification sweep, not on every read.

use sqlx::{Pool, Sqlite};
use tracing::{debug, info, warn};

use signcast_common::model::MediaAsset;

use crate::db;
use crate::error::Result;
use crate::net::download::MIN_MEDIA_BYTES;
use crate::probe;

/// Cheap read-time check: present and above the minimum transfer size.
pub fn verified_on_disk(path: &str) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > MIN_MEDIA_BYTES,
        Err(_) => false,
    }
}

/// Load the current catalog generation with every local path re-checked
/// against the filesystem. Paths that no longer verify are dropped from
/// the returned view (the rows keep them until the sweep clears them), so
/// callers always fall back to the remote URL.
pub async fn effective_catalog(db: &Pool<Sqlite>) -> Result<Vec<MediaAsset>> {
    let mut assets = db::catalog::load_all(db).await?;
    for asset in &mut assets {
        if let Some(path) = asset.local_path.clone() {
            if !verified_on_disk(&path) {
                debug!(
                    "Local copy for asset {} missing or truncated, using remote",
                    asset.id
                );
                asset.local_path = None;
            }
        }
        for sub in &mut asset.sub_assets {
            if let Some(path) = sub.local_path.clone() {
                if !verified_on_disk(&path) {
                    debug!(
                        "Local copy for sub-asset {} of {} missing or truncated, using remote",
                        sub.id, asset.id
                    );
                    sub.local_path = None;
                }
            }
        }
    }
    Ok(assets)
}

/// Full verification for the sweep: on-disk check plus decodability probe.
async fn sweep_verified(path: &str) -> bool {
    if !verified_on_disk(path) {
        return false;
    }
    let owned = std::path::PathBuf::from(path);
    tokio::task::spawn_blocking(move || probe::is_decodable(&owned))
        .await
        .unwrap_or(false)
}

/// Sweep every persisted local path and clear the ones whose files are
/// gone, truncated, or no longer decode. Only the failing `local_path`
/// fields are touched; rows and all other columns stay as they are.
/// Returns how many paths were cleared. Idempotent.
pub async fn verify_saved_files(db: &Pool<Sqlite>) -> Result<u32> {
    let assets = db::catalog::load_all(db).await?;
    let mut cleared = 0u32;

    for asset in &assets {
        if let Some(path) = &asset.local_path {
            if !sweep_verified(path).await {
                warn!(
                    "Cached file for asset {} failed verification, clearing: {}",
                    asset.id, path
                );
                db::catalog::clear_asset_local_path(db, &asset.id).await?;
                cleared += 1;
            }
        }
        for (position, sub) in asset.sub_assets.iter().enumerate() {
            if let Some(path) = &sub.local_path {
                if !sweep_verified(path).await {
                    warn!(
                        "Cached file for sub-asset {} of {} failed verification, clearing: {}",
                        sub.id, asset.id, path
                    );
                    db::catalog::clear_sub_asset_local_path(db, &asset.id, position).await?;
                    cleared += 1;
                }
            }
        }
    }

    if cleared > 0 {
        info!("Verification sweep cleared {} stale local paths", cleared);
    } else {
        debug!("Verification sweep found nothing to clear");
    }
    Ok(cleared)
}
