//! Catalog sync orchestration
//!
//! All catalog mutations flow through one worker task fed by an unbounded
//! command queue, so a catalog push arriving mid-download cannot interleave
//! with the pass already running. The worker downloads media for a payload,
//! persists the generation atomically and nudges the scheduler.
//!
//! The module also hosts the glue tasks around the worker: the signal
//! router that turns registration events into commands, the supervisor
//! that re-registers when connectivity returns after a give-up, and the
//! periodic verification timer.

use crate::db;
use crate::net::catalog::CatalogFetcher;
use crate::net::connectivity::Connectivity;
use crate::net::download::AssetDownloader;
use crate::net::registration::{wait_or_shutdown, RegistrationClient, RegistrationSignal};
use crate::playback::scheduler::PlaybackScheduler;
use crate::state::SharedState;
use crate::sync::cache;
use chrono::Utc;
use signcast_common::events::PlayerEvent;
use signcast_common::model::{MediaAsset, UrlType};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// How often the supervisor re-probes a dead upstream
pub const NETWORK_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Serialized catalog mutations
enum SyncCommand {
    /// Download media for this payload, then persist it as the new generation
    ApplyCatalog(Vec<MediaAsset>),
    /// Fetch the catalog over REST first; `None` means our own device id
    FetchAndApply { device_id: Option<String> },
    /// Sweep cached files and clear paths that fail verification
    Verify,
}

/// Cheap cloneable front for enqueueing catalog mutations
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub fn apply_catalog(&self, assets: Vec<MediaAsset>) {
        let _ = self.command_tx.send(SyncCommand::ApplyCatalog(assets));
    }

    pub fn fetch_and_apply(&self) {
        let _ = self
            .command_tx
            .send(SyncCommand::FetchAndApply { device_id: None });
    }

    pub fn fetch_for(&self, device_id: String) {
        let _ = self.command_tx.send(SyncCommand::FetchAndApply {
            device_id: Some(device_id),
        });
    }

    pub fn verify(&self) {
        let _ = self.command_tx.send(SyncCommand::Verify);
    }
}

/// Catalog mutation worker
pub struct SyncEngine {
    db: Pool<Sqlite>,
    state: Arc<SharedState>,
    scheduler: PlaybackScheduler,
    downloader: AssetDownloader,
    fetcher: CatalogFetcher,
    command_rx: mpsc::UnboundedReceiver<SyncCommand>,
}

impl SyncEngine {
    pub fn new(
        db: Pool<Sqlite>,
        state: Arc<SharedState>,
        scheduler: PlaybackScheduler,
        downloader: AssetDownloader,
        fetcher: CatalogFetcher,
    ) -> (Self, SyncHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (
            Self {
                db,
                state,
                scheduler,
                downloader,
                fetcher,
                command_rx,
            },
            SyncHandle { command_tx },
        )
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.command_rx.recv().await {
            match command {
                SyncCommand::ApplyCatalog(assets) => self.apply_catalog(assets).await,
                SyncCommand::FetchAndApply { device_id } => {
                    self.fetch_and_apply(device_id).await
                }
                SyncCommand::Verify => self.run_verify().await,
            }
        }
        debug!("Sync queue closed, worker exiting");
    }

    async fn fetch_and_apply(&self, device_id: Option<String>) {
        let device_id = match device_id {
            Some(id) => id,
            None => self.state.get_device_identity().await.0,
        };
        let assets = self.fetcher.fetch(&device_id).await;
        self.apply_catalog(assets).await;
    }

    /// One download-then-persist pass.
    ///
    /// Media is fetched before the generation swap, so a freshly persisted
    /// catalog always points at whatever local files could be produced.
    /// A failed download leaves `local_path` unset and the asset plays
    /// from its remote URL. An empty payload never replaces a populated
    /// catalog. A blocked signal abandons the pass before the swap.
    async fn apply_catalog(&self, mut assets: Vec<MediaAsset>) {
        if assets.is_empty() {
            warn!("Catalog payload is empty, keeping the previous catalog");
            self.state.broadcast_event(PlayerEvent::SyncFailed {
                reason: "catalog payload was empty".to_string(),
                timestamp: Utc::now(),
            });
            return;
        }
        if self.state.is_blocked() {
            info!("Device is blocked, skipping catalog sync");
            return;
        }

        info!("Syncing catalog: {} assets", assets.len());
        for asset in &mut assets {
            if self.state.is_blocked() {
                warn!("Blocked mid-sync, abandoning this pass");
                return;
            }

            if !asset.primary_url.is_empty() {
                asset.local_path = self
                    .downloader
                    .download(&asset.id, &asset.primary_url)
                    .await
                    .map(|path| path.to_string_lossy().into_owned());
            }

            for (position, sub) in asset.sub_assets.iter_mut().enumerate() {
                if sub.url_type != UrlType::Video || sub.url.is_empty() {
                    continue;
                }
                if self.state.is_blocked() {
                    warn!("Blocked mid-sync, abandoning this pass");
                    return;
                }
                // Sub-assets without their own id key on asset id + pane
                let key = if sub.id.is_empty() {
                    format!("{}_{}", asset.id, position)
                } else {
                    sub.id.clone()
                };
                sub.local_path = self
                    .downloader
                    .download(&key, &sub.url)
                    .await
                    .map(|path| path.to_string_lossy().into_owned());
            }
        }

        if self.state.is_blocked() {
            warn!("Blocked before persist, abandoning this pass");
            return;
        }

        match db::catalog::replace_all(&self.db, &assets).await {
            Ok(()) => {
                info!("Catalog generation persisted: {} assets", assets.len());
                self.state.broadcast_event(PlayerEvent::CatalogUpdated {
                    asset_count: assets.len(),
                    timestamp: Utc::now(),
                });
                self.scheduler.catalog_updated().await;
            }
            Err(e) => {
                error!("Failed to persist catalog: {}", e);
                self.state.broadcast_event(PlayerEvent::SyncFailed {
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    async fn run_verify(&self) {
        match cache::verify_saved_files(&self.db).await {
            Ok(cleared) => {
                if cleared > 0 {
                    info!("Verification sweep cleared {} cached file paths", cleared);
                }
                self.state.broadcast_event(PlayerEvent::VerifyCompleted {
                    cleared: cleared as usize,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => error!("Verification sweep failed: {}", e),
        }
    }
}

/// Turn registration signals into catalog mutations and playback control.
pub async fn route_registration_signals(
    mut signal_rx: mpsc::UnboundedReceiver<RegistrationSignal>,
    state: Arc<SharedState>,
    scheduler: PlaybackScheduler,
    sync: SyncHandle,
) {
    while let Some(signal) = signal_rx.recv().await {
        match signal {
            RegistrationSignal::CatalogInline(assets) => {
                info!("Catalog pushed inline: {} assets", assets.len());
                sync.apply_catalog(assets);
            }
            RegistrationSignal::CatalogAnnounced(device_id) => {
                info!("Catalog announced for {}, fetching over REST", device_id);
                sync.fetch_for(device_id);
            }
            RegistrationSignal::Failed(reason) => {
                warn!(
                    "Registration is not delivering a catalog ({}), falling back to REST",
                    reason
                );
                sync.fetch_and_apply();
            }
            RegistrationSignal::BlockedChanged(true) => {
                info!("Device blocked by upstream");
                state.set_blocked(true);
                scheduler.halt().await;
                state.broadcast_event(PlayerEvent::BlockedChanged {
                    blocked: true,
                    timestamp: Utc::now(),
                });
            }
            RegistrationSignal::BlockedChanged(false) => {
                info!("Device unblocked by upstream");
                state.set_blocked(false);
                state.broadcast_event(PlayerEvent::BlockedChanged {
                    blocked: false,
                    timestamp: Utc::now(),
                });
                // Resume from cache right away; a fresh fetch follows
                scheduler.start().await;
                sync.fetch_and_apply();
            }
        }
    }
    debug!("Registration signal channel closed");
}

/// Keep a registration client alive across give-ups.
///
/// `RegistrationClient::run` returns when the connection gives up (retries
/// exhausted or no network). The supervisor then polls reachability and
/// re-registers once the upstream answers again.
pub async fn supervise_registration(
    ws_url: String,
    state: Arc<SharedState>,
    connectivity: Option<Connectivity>,
    signal_tx: mpsc::UnboundedSender<RegistrationSignal>,
    mut shutdown_rx: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    loop {
        let (device_id, device_name) = state.get_device_identity().await;
        let client = RegistrationClient::new(
            ws_url.clone(),
            device_id,
            device_name,
            state.clone(),
            connectivity.clone(),
            signal_tx.clone(),
            shutdown_rx.clone(),
        );
        client.run().await;

        if *shutdown_rx.borrow() {
            return;
        }

        loop {
            if wait_or_shutdown(&mut shutdown_rx, poll_interval).await {
                return;
            }
            let online = match &connectivity {
                Some(connectivity) => connectivity.is_online().await,
                None => true,
            };
            if online {
                break;
            }
        }
        info!("Upstream reachable again, re-registering");
    }
}

/// Enqueue a verification sweep on a fixed interval.
pub async fn run_verify_timer(
    sync: SyncHandle,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if wait_or_shutdown(&mut shutdown_rx, interval).await {
            return;
        }
        debug!("Periodic verification sweep");
        sync.verify();
    }
}
