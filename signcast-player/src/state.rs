//! Shared player state
//!
//! Thread-safe shared state for coordination between the registration
//! client, the sync engine, the scheduler and the control API.

use crate::playback::types::SchedulerPhase;
use signcast_common::events::PlayerEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch, RwLock};

/// Shared state accessible by all components
pub struct SharedState {
    /// Upstream blocked flag; sync and playback halt while true
    blocked_tx: watch::Sender<bool>,

    /// Scheduler phase mirror for the status endpoint
    pub scheduler_phase: RwLock<SchedulerPhase>,

    /// Asset currently directed at the rendering surface
    pub current_asset: RwLock<Option<String>>,

    /// Device identity, loaded from the settings table at startup
    pub device_id: RwLock<String>,
    pub device_name: RwLock<String>,

    /// Last observed network reachability
    network_online: AtomicBool,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<PlayerEvent>,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        let (blocked_tx, _) = watch::channel(false);
        Self {
            blocked_tx,
            scheduler_phase: RwLock::new(SchedulerPhase::Idle),
            current_asset: RwLock::new(None),
            device_id: RwLock::new(String::new()),
            device_name: RwLock::new(String::new()),
            network_online: AtomicBool::new(true),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: PlayerEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    /// Current blocked flag
    pub fn is_blocked(&self) -> bool {
        *self.blocked_tx.borrow()
    }

    /// Set the blocked flag; observers see the transition immediately
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked_tx.send_replace(blocked);
    }

    /// Watch blocked transitions without polling
    pub fn watch_blocked(&self) -> watch::Receiver<bool> {
        self.blocked_tx.subscribe()
    }

    /// Get scheduler phase
    pub async fn get_scheduler_phase(&self) -> SchedulerPhase {
        *self.scheduler_phase.read().await
    }

    /// Set scheduler phase
    pub async fn set_scheduler_phase(&self, phase: SchedulerPhase) {
        *self.scheduler_phase.write().await = phase;
    }

    /// Get the asset id currently directed at the surface
    pub async fn get_current_asset(&self) -> Option<String> {
        self.current_asset.read().await.clone()
    }

    /// Set (or clear) the current asset id
    pub async fn set_current_asset(&self, asset_id: Option<String>) {
        *self.current_asset.write().await = asset_id;
    }

    /// Record the device identity after settings bootstrap
    pub async fn set_device_identity(&self, id: String, name: String) {
        *self.device_id.write().await = id;
        *self.device_name.write().await = name;
    }

    /// Device identity pair (id, name)
    pub async fn get_device_identity(&self) -> (String, String) {
        (
            self.device_id.read().await.clone(),
            self.device_name.read().await.clone(),
        )
    }

    /// Last observed network reachability
    pub fn is_online(&self) -> bool {
        self.network_online.load(Ordering::Relaxed)
    }

    /// Record a reachability observation
    pub fn set_online(&self, online: bool) {
        self.network_online.store(online, Ordering::Relaxed);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_blocked_flag() {
        let state = SharedState::new();

        // Default is unblocked
        assert!(!state.is_blocked());

        let mut rx = state.watch_blocked();
        state.set_blocked(true);
        assert!(state.is_blocked());

        // Watcher observes the transition
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_scheduler_phase() {
        let state = SharedState::new();

        assert_eq!(state.get_scheduler_phase().await, SchedulerPhase::Idle);

        state.set_scheduler_phase(SchedulerPhase::Playing).await;
        assert_eq!(state.get_scheduler_phase().await, SchedulerPhase::Playing);
    }

    #[tokio::test]
    async fn test_event_broadcast() {
        let state = SharedState::new();
        let mut rx = state.subscribe_events();

        state.broadcast_event(PlayerEvent::BlockedChanged {
            blocked: true,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "BlockedChanged");
    }

    #[tokio::test]
    async fn test_current_asset() {
        let state = SharedState::new();

        assert!(state.get_current_asset().await.is_none());

        state.set_current_asset(Some("asset-9".to_string())).await;
        assert_eq!(state.get_current_asset().await.as_deref(), Some("asset-9"));
    }
}
