//! Validated media download pipeline.
//!
//! Fetches remote media into the local media directory and refuses to hand
//! back anything that does not look playable: the file must exist, exceed a
//! minimum size, be readable, and pass the decodability probe. Failure is
//! always reported as `None`; callers fall back to streaming the remote URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::net::connectivity::Connectivity;
use crate::probe;

/// Files at or below this size are treated as failed transfers.
pub const MIN_MEDIA_BYTES: u64 = 1024;

/// First try plus three retries.
const MAX_ATTEMPTS: u32 = 4;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Outcome of a single transfer attempt. `Rejected` covers responses the
/// server produced but we refuse (bad status, undersized body); transport
/// and filesystem failures surface as errors and are retried with backoff.
enum TransferOutcome {
    Written,
    Rejected(&'static str),
}

pub struct AssetDownloader {
    http_client: reqwest::Client,
    media_dir: PathBuf,
    connectivity: Option<Connectivity>,
    backoff_base: Duration,
}

impl AssetDownloader {
    /// `media_dir` is created on first use. `connectivity` gates transfers;
    /// pass `None` to skip the reachability check (tests, localhost).
    pub fn new(media_dir: impl Into<PathBuf>, connectivity: Option<Connectivity>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("signcast/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http_client,
            media_dir: media_dir.into(),
            connectivity,
            backoff_base: DEFAULT_BACKOFF_BASE,
        })
    }

    /// Override the retry backoff base (tests).
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Destination path for an asset's cached media.
    pub fn media_path(&self, asset_id: &str) -> PathBuf {
        self.media_dir.join(format!("{}.mp4", asset_id))
    }

    /// Download `url` for `asset_id`, returning the verified local path or
    /// `None`. Never errors: `None` is the uniform failure signal.
    ///
    /// Per attempt: a valid cached copy short-circuits; no network returns
    /// `None` without a transfer; a bad status or undersized body retries
    /// immediately; a transport or filesystem error sleeps
    /// `backoff * 2^attempt` first. A freshly written file that fails
    /// re-verification is deleted and the whole download gives up.
    pub async fn download(&self, asset_id: &str, url: &str) -> Option<PathBuf> {
        if url.trim().is_empty() {
            warn!("No URL for asset {}, skipping download", asset_id);
            return None;
        }

        for attempt in 0..MAX_ATTEMPTS {
            if let Err(e) = tokio::fs::create_dir_all(&self.media_dir).await {
                warn!(
                    "Cannot create media directory {}: {}",
                    self.media_dir.display(),
                    e
                );
                return None;
            }
            let dest = self.media_path(asset_id);

            if usable_cached_copy(&dest).await {
                debug!("Asset {} already cached at {}", asset_id, dest.display());
                return Some(dest);
            }

            if let Some(connectivity) = &self.connectivity {
                if !connectivity.is_online().await {
                    warn!("No network, cannot download asset {}", asset_id);
                    return None;
                }
            }

            debug!(
                "Downloading {} for asset {} (attempt {} of {})",
                url,
                asset_id,
                attempt + 1,
                MAX_ATTEMPTS
            );
            match self.transfer(url, &dest).await {
                Ok(TransferOutcome::Written) => {
                    if verified_media_file(&dest).await {
                        debug!("Downloaded asset {} to {}", asset_id, dest.display());
                        return Some(dest);
                    }
                    warn!(
                        "Downloaded file for asset {} failed verification, deleting",
                        asset_id
                    );
                    let _ = tokio::fs::remove_file(&dest).await;
                    return None;
                }
                Ok(TransferOutcome::Rejected(reason)) => {
                    debug!(
                        "Transfer rejected for asset {} (attempt {}): {}",
                        asset_id,
                        attempt + 1,
                        reason
                    );
                }
                Err(e) => {
                    warn!(
                        "Download error for asset {} (attempt {}): {}",
                        asset_id,
                        attempt + 1,
                        e
                    );
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(self.backoff_base * 2u32.pow(attempt)).await;
                    }
                }
            }
        }

        warn!(
            "Giving up on asset {} after {} attempts",
            asset_id, MAX_ATTEMPTS
        );
        None
    }

    async fn transfer(&self, url: &str, dest: &Path) -> Result<TransferOutcome> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("Transfer from {} returned HTTP {}", url, status);
            return Ok(TransferOutcome::Rejected("non-success status"));
        }
        let bytes = response.bytes().await?;
        if (bytes.len() as u64) < MIN_MEDIA_BYTES {
            debug!("Transfer from {} returned only {} bytes", url, bytes.len());
            return Ok(TransferOutcome::Rejected("undersized body"));
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(TransferOutcome::Written)
    }
}

/// Cache check: exists, above the minimum size, readable, decodable. An
/// existing file that fails any check is deleted so a transfer can rewrite
/// it.
async fn usable_cached_copy(dest: &Path) -> bool {
    match tokio::fs::metadata(dest).await {
        Ok(meta) if meta.is_file() => {
            if verified_media_file(dest).await {
                return true;
            }
            warn!("Cached file {} is not playable, deleting", dest.display());
            let _ = tokio::fs::remove_file(dest).await;
            false
        }
        _ => false,
    }
}

/// Full verification pass: size, readability, decodability probe.
async fn verified_media_file(dest: &Path) -> bool {
    let meta = match tokio::fs::metadata(dest).await {
        Ok(meta) => meta,
        Err(_) => return false,
    };
    if meta.len() <= MIN_MEDIA_BYTES {
        return false;
    }
    if tokio::fs::File::open(dest).await.is_err() {
        return false;
    }
    let owned = dest.to_path_buf();
    tokio::task::spawn_blocking(move || probe::is_decodable(&owned))
        .await
        .unwrap_or(false)
}
