//! Playback scheduler
//!
//! Walks the cached catalog in display order and directs the rendering
//! surface one asset at a time through `NowPlaying` events. The scheduler
//! never touches media bytes itself: it resolves each pane to a local or
//! remote source and waits for the surface to report the outcome per pane.
//!
//! An asset is finished when every pane has reported. SINGLE assets have
//! one pane; MULTIPLE assets have two and additionally run under a stall
//! timer, so one wedged pane cannot freeze the loop. Running off the end
//! of the queue reloads the catalog and starts the next cycle; the loop
//! only stops when a reload comes back empty.

use crate::db;
use crate::playback::types::SchedulerPhase;
use crate::state::SharedState;
use crate::sync::cache;
use chrono::Utc;
use signcast_common::events::{NowPlayingInfo, PaneSourceInfo, PlayerEvent};
use signcast_common::model::{MediaAsset, MediaKind, UrlType};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a MULTIPLE asset may run without both panes reporting
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Local files above this size are assumed to be 4K encodes
const LIKELY_4K_BYTES: u64 = 50 * 1024 * 1024;

/// Surface-facing playback state for one pane of the current asset
struct PaneState {
    /// Pane has reported completion (or errored past its retry)
    reported: bool,
    /// The one-shot remote retry has been spent
    retried: bool,
    /// Replay source for the retry path
    remote_url: String,
}

/// The asset currently directed at the surface
struct CurrentAsset {
    asset_id: String,
    panes: Vec<PaneState>,
}

struct SchedulerInner {
    /// Immutable snapshot of the playable catalog for this cycle
    queue: Vec<MediaAsset>,
    /// Next queue position to hand to the surface
    next_index: usize,
    current: Option<CurrentAsset>,
    /// Bumped on every transition; stale stall timers check it and bail
    epoch: u64,
    /// A newer catalog generation exists; reload at the next transition
    reload_pending: bool,
    /// Decoder 4K capability, re-read on every queue reload
    supports_4k: bool,
    stall_handle: Option<JoinHandle<()>>,
}

/// Catalog-driven playback loop
#[derive(Clone)]
pub struct PlaybackScheduler {
    db: Pool<Sqlite>,
    state: Arc<SharedState>,
    inner: Arc<Mutex<SchedulerInner>>,
    stall_timeout: Duration,
}

impl PlaybackScheduler {
    pub fn new(db: Pool<Sqlite>, state: Arc<SharedState>) -> Self {
        Self::with_stall_timeout(db, state, DEFAULT_STALL_TIMEOUT)
    }

    pub fn with_stall_timeout(
        db: Pool<Sqlite>,
        state: Arc<SharedState>,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            db,
            state,
            inner: Arc::new(Mutex::new(SchedulerInner {
                queue: Vec::new(),
                next_index: 0,
                current: None,
                epoch: 0,
                reload_pending: false,
                supports_4k: false,
                stall_handle: None,
            })),
            stall_timeout,
        }
    }

    /// Start (or restart) the loop from the head of the catalog.
    pub async fn start(&self) {
        let mut inner = self.inner.lock().await;
        self.begin(&mut inner).await;
    }

    /// Skip to the next asset without waiting for pane reports.
    ///
    /// When the queue comes back around to the asset already playing, the
    /// transition is ignored and playback continues undisturbed.
    pub async fn advance(&self) {
        let mut inner = self.inner.lock().await;
        self.transition(&mut inner).await;
    }

    /// Surface report: the given pane finished rendering its source.
    ///
    /// Repeat reports for a pane are ignored. Once every pane of the
    /// current asset has reported, the loop moves on.
    pub async fn pane_completed(&self, pane: usize) {
        let mut inner = self.inner.lock().await;
        let current = match inner.current.as_mut() {
            Some(current) => current,
            None => {
                debug!("Pane {} completion with nothing playing, ignoring", pane);
                return;
            }
        };
        let pane_state = match current.panes.get_mut(pane) {
            Some(pane_state) => pane_state,
            None => {
                warn!("Pane {} out of range for asset {}", pane, current.asset_id);
                return;
            }
        };
        if pane_state.reported {
            debug!(
                "Pane {} of asset {} already reported, ignoring",
                pane, current.asset_id
            );
            return;
        }
        pane_state.reported = true;
        debug!("Pane {} of asset {} completed", pane, current.asset_id);

        if current.panes.iter().all(|pane| pane.reported) {
            self.finish_current(&mut inner, "all panes reported").await;
        }
    }

    /// Surface report: the given pane failed to render its source.
    ///
    /// The first failure replays the pane from its remote URL via a
    /// `PaneRetry` event. A failure after the retry counts the pane as
    /// finished so the asset can still complete.
    pub async fn pane_errored(&self, pane: usize) {
        let mut inner = self.inner.lock().await;
        let current = match inner.current.as_mut() {
            Some(current) => current,
            None => {
                debug!("Pane {} error with nothing playing, ignoring", pane);
                return;
            }
        };
        let asset_id = current.asset_id.clone();
        let pane_state = match current.panes.get_mut(pane) {
            Some(pane_state) => pane_state,
            None => {
                warn!("Pane {} out of range for asset {}", pane, asset_id);
                return;
            }
        };
        if pane_state.reported {
            debug!(
                "Pane {} of asset {} errored after reporting, ignoring",
                pane, asset_id
            );
            return;
        }

        if !pane_state.retried {
            pane_state.retried = true;
            let uri = pane_state.remote_url.clone();
            warn!(
                "Pane {} of asset {} failed, replaying from remote source",
                pane, asset_id
            );
            self.state.broadcast_event(PlayerEvent::PaneRetry {
                asset_id,
                pane,
                uri,
                timestamp: Utc::now(),
            });
            return;
        }

        warn!(
            "Pane {} of asset {} failed after its retry, treating as finished",
            pane, asset_id
        );
        pane_state.reported = true;
        if current.panes.iter().all(|pane| pane.reported) {
            self.finish_current(&mut inner, "all panes settled").await;
        }
    }

    /// A new catalog generation was persisted.
    ///
    /// A stopped loop starts immediately; a running one keeps the current
    /// cycle's snapshot and picks up the new generation at the next
    /// transition.
    pub async fn catalog_updated(&self) {
        let mut inner = self.inner.lock().await;
        match self.state.get_scheduler_phase().await {
            SchedulerPhase::Idle | SchedulerPhase::Exhausted => {
                debug!("Catalog updated while stopped, starting playback");
                self.begin(&mut inner).await;
            }
            SchedulerPhase::Loading | SchedulerPhase::Playing => {
                debug!("Catalog updated mid-cycle, applying at the next transition");
                inner.reload_pending = true;
            }
        }
    }

    /// Stop the loop and withdraw the current asset from the surface.
    pub async fn halt(&self) {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        if let Some(handle) = inner.stall_handle.take() {
            handle.abort();
        }
        inner.current = None;
        info!("Playback halted");
        self.state.set_current_asset(None).await;
        self.state.set_scheduler_phase(SchedulerPhase::Idle).await;
    }

    /// Begin a fresh cycle from the head of the catalog.
    async fn begin(&self, inner: &mut SchedulerInner) {
        inner.current = None;
        inner.reload_pending = true;
        self.transition(inner).await;
    }

    /// Move to the next queue entry.
    ///
    /// Completion paths clear `current` before calling this, so the normal
    /// loop never trips the duplicate check; external skips keep it set and
    /// a wrap-around to the playing asset is a no-op.
    async fn transition(&self, inner: &mut SchedulerInner) {
        if self.state.is_blocked() {
            debug!("Ignoring playback transition while blocked");
            return;
        }

        inner.epoch += 1;
        if let Some(handle) = inner.stall_handle.take() {
            handle.abort();
        }

        if inner.reload_pending || inner.next_index >= inner.queue.len() {
            self.reload_queue(inner).await;
            if inner.queue.is_empty() {
                self.enter_exhausted(inner).await;
                return;
            }
        }

        let entry = inner.queue[inner.next_index].clone();
        inner.next_index += 1;

        if let Some(current) = &inner.current {
            if current.asset_id == entry.id {
                debug!("Asset {} is already playing, ignoring transition", entry.id);
                return;
            }
        }

        self.direct_play(inner, entry).await;
    }

    /// Snapshot the playable catalog and re-read decoder capability.
    async fn reload_queue(&self, inner: &mut SchedulerInner) {
        inner.reload_pending = false;
        inner.next_index = 0;

        match cache::effective_catalog(&self.db).await {
            Ok(assets) => {
                let total = assets.len();
                inner.queue = assets.into_iter().filter(|a| a.is_playable()).collect();
                if inner.queue.len() < total {
                    debug!(
                        "{} of {} catalog entries are playable",
                        inner.queue.len(),
                        total
                    );
                }
            }
            Err(e) => {
                warn!("Failed to load catalog for playback: {}", e);
                inner.queue = Vec::new();
            }
        }

        inner.supports_4k = db::settings::get_decoder_supports_4k(&self.db)
            .await
            .unwrap_or(false);
    }

    /// Nothing playable remains; park until the next catalog update.
    async fn enter_exhausted(&self, inner: &mut SchedulerInner) {
        inner.current = None;
        warn!("Catalog has nothing playable, playback loop stopped");
        self.state.set_current_asset(None).await;
        self.state
            .set_scheduler_phase(SchedulerPhase::Exhausted)
            .await;
        self.state.broadcast_event(PlayerEvent::PlaybackExhausted {
            timestamp: Utc::now(),
        });
    }

    /// The current asset is done; move on.
    async fn finish_current(&self, inner: &mut SchedulerInner, why: &str) {
        if let Some(current) = inner.current.take() {
            debug!("Asset {} finished: {}", current.asset_id, why);
        }
        self.transition(inner).await;
    }

    /// Hand one asset to the surface and arm the stall timer if needed.
    async fn direct_play(&self, inner: &mut SchedulerInner, entry: MediaAsset) {
        self.state.set_scheduler_phase(SchedulerPhase::Loading).await;

        let panes = self.resolve_panes(&entry, inner.supports_4k);
        inner.current = Some(CurrentAsset {
            asset_id: entry.id.clone(),
            panes: panes
                .iter()
                .map(|pane| PaneState {
                    reported: false,
                    retried: false,
                    remote_url: pane.remote_url.clone(),
                })
                .collect(),
        });

        info!(
            "Now playing {} ({}, {} pane{})",
            entry.id,
            entry.kind,
            panes.len(),
            if panes.len() == 1 { "" } else { "s" }
        );
        self.state.set_current_asset(Some(entry.id.clone())).await;
        self.state.set_scheduler_phase(SchedulerPhase::Playing).await;

        let kind = entry.kind;
        self.state.broadcast_event(PlayerEvent::NowPlaying {
            asset: NowPlayingInfo {
                asset_id: entry.id,
                title: entry.title,
                kind,
                duration_seconds: entry.duration_seconds,
                panes,
            },
            timestamp: Utc::now(),
        });

        if kind == MediaKind::Multiple {
            self.arm_stall_timer(inner);
        }
    }

    /// Resolve each pane of the asset to its effective source.
    fn resolve_panes(&self, entry: &MediaAsset, supports_4k: bool) -> Vec<PaneSourceInfo> {
        match entry.kind {
            MediaKind::Single => {
                let (uri, local) =
                    resolve_video_source(entry.local_path.as_deref(), &entry.primary_url, supports_4k);
                vec![PaneSourceInfo {
                    pane: 0,
                    source_type: UrlType::Video,
                    uri,
                    remote_url: entry.primary_url.clone(),
                    local,
                }]
            }
            MediaKind::Multiple => entry
                .sub_assets
                .iter()
                .take(2)
                .enumerate()
                .map(|(pane, sub)| match sub.url_type {
                    UrlType::Video => {
                        let (uri, local) =
                            resolve_video_source(sub.local_path.as_deref(), &sub.url, supports_4k);
                        PaneSourceInfo {
                            pane,
                            source_type: UrlType::Video,
                            uri,
                            remote_url: sub.url.clone(),
                            local,
                        }
                    }
                    // Images always render from their remote URL
                    UrlType::Image => PaneSourceInfo {
                        pane,
                        source_type: UrlType::Image,
                        uri: sub.url.clone(),
                        remote_url: sub.url.clone(),
                        local: false,
                    },
                })
                .collect(),
        }
    }

    /// Bound how long a MULTIPLE asset may hold the surface.
    ///
    /// The task captures the epoch at arm time; a transition bumps the
    /// epoch and aborts the handle, so a stale timer can never fire into
    /// a newer asset.
    fn arm_stall_timer(&self, inner: &mut SchedulerInner) {
        let scheduler = self.clone();
        let epoch = inner.epoch;
        let timeout = self.stall_timeout;
        inner.stall_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            scheduler.stall_fired(epoch).await;
        }));
    }

    async fn stall_fired(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || inner.current.is_none() {
            return;
        }
        warn!("Stall timeout reached, forcing completion");
        self.finish_current(&mut inner, "stall timeout").await;
    }

    /// Snapshot for the status endpoint: queue length and position.
    pub async fn queue_status(&self) -> (usize, usize) {
        let inner = self.inner.lock().await;
        (inner.queue.len(), inner.next_index)
    }
}

/// Choose the effective source for a video pane.
///
/// A verified local file wins unless the decoder cannot handle 4K and the
/// file is large enough to be a 4K encode; the remote side serves a
/// rendition the device can decode.
fn resolve_video_source(
    local_path: Option<&str>,
    remote_url: &str,
    supports_4k: bool,
) -> (String, bool) {
    match local_path {
        Some(path) => {
            if !supports_4k && likely_4k(path) {
                warn!(
                    "Decoder lacks 4K support and {} looks like a 4K encode, using remote source",
                    path
                );
                (remote_url.to_string(), false)
            } else {
                (path.to_string(), true)
            }
        }
        None => (remote_url.to_string(), false),
    }
}

fn likely_4k(path: &str) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len() > LIKELY_4K_BYTES,
        Err(_) => false,
    }
}
