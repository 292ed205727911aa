//! Persistent registration connection to the upstream service
//!
//! Owns the WebSocket lifecycle: connect with bounded retries, announce the
//! device, then translate inbound frames into signals for the sync
//! orchestrator. The transport never does catalog work itself; fetches and
//! downloads happen on the orchestrator's queue so a slow sync cannot stall
//! frame delivery here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use signcast_common::events::{PlayerEvent, RegistrationPhase};
use signcast_common::model::MediaAsset;

use crate::net::connectivity::Connectivity;
use crate::net::protocol::{self, ClientMessage, ServerMessage};
use crate::state::SharedState;

/// First try plus two retries, each gated on network availability.
const MAX_CONNECT_ATTEMPTS: u32 = 3;

const DEFAULT_CONNECT_RETRY_BASE: Duration = Duration::from_secs(2);

/// Bound on the registration-to-catalog handshake. Armed when the register
/// message goes out; only a catalog signal disarms it. A bare registration
/// acknowledgement does not.
const DEFAULT_MEDIA_WAIT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the registration transport reports to the orchestrator. Every
/// session outcome funnels into exactly one of these.
#[derive(Debug)]
pub enum RegistrationSignal {
    /// `catalog_ready` carried an inline payload, already parsed and
    /// filtered to active entries
    CatalogInline(Vec<MediaAsset>),
    /// `catalog_ready` named a device id; the catalog must be fetched
    CatalogAnnounced(String),
    /// Upstream blocked (true) or unblocked (false) this device
    BlockedChanged(bool),
    /// Registration is not going to produce a catalog: rejected, timed
    /// out, or connection retries exhausted
    Failed(String),
}

enum ConnectOutcome {
    Connected(WsStream),
    GaveUp(&'static str),
    Shutdown,
}

enum SessionEnd {
    Disconnected,
    Shutdown,
}

pub struct RegistrationClient {
    ws_url: String,
    device_id: String,
    device_name: String,
    state: Arc<SharedState>,
    connectivity: Option<Connectivity>,
    signal_tx: mpsc::UnboundedSender<RegistrationSignal>,
    shutdown_rx: watch::Receiver<bool>,
    retry_base: Duration,
    media_wait: Duration,
}

impl RegistrationClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ws_url: impl Into<String>,
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        state: Arc<SharedState>,
        connectivity: Option<Connectivity>,
        signal_tx: mpsc::UnboundedSender<RegistrationSignal>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            device_id: device_id.into(),
            device_name: device_name.into(),
            state,
            connectivity,
            signal_tx,
            shutdown_rx,
            retry_base: DEFAULT_CONNECT_RETRY_BASE,
            media_wait: DEFAULT_MEDIA_WAIT,
        }
    }

    /// Shrink the retry and media-wait timing (tests).
    #[cfg(test)]
    pub fn with_timing(mut self, retry_base: Duration, media_wait: Duration) -> Self {
        self.retry_base = retry_base;
        self.media_wait = media_wait;
        self
    }

    /// Run until shutdown or until the connection gives up. Reconnects
    /// after a lost session; the caller restarts the whole client when
    /// connectivity returns after a give-up.
    pub async fn run(self) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            let stream = match self.connect_with_retry(&mut shutdown).await {
                ConnectOutcome::Connected(stream) => stream,
                ConnectOutcome::Shutdown => return,
                ConnectOutcome::GaveUp(reason) => {
                    self.emit_phase(RegistrationPhase::Failed);
                    let _ = self
                        .signal_tx
                        .send(RegistrationSignal::Failed(reason.to_string()));
                    return;
                }
            };
            match self.session(stream, &mut shutdown).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Disconnected => {
                    warn!("Registration connection lost, reconnecting");
                }
            }
        }
    }

    async fn connect_with_retry(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectOutcome {
        self.emit_phase(RegistrationPhase::Connecting);
        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            if let Some(connectivity) = &self.connectivity {
                if !connectivity.is_online().await {
                    warn!("No network available, abandoning registration");
                    self.state.set_online(false);
                    self.emit_phase(RegistrationPhase::Offline);
                    return ConnectOutcome::GaveUp("no network available");
                }
            }
            match connect_async(&self.ws_url).await {
                Ok((stream, _)) => {
                    debug!("Registration socket connected to {}", self.ws_url);
                    self.state.set_online(true);
                    return ConnectOutcome::Connected(stream);
                }
                Err(e) => {
                    warn!(
                        "Registration connect attempt {} of {} failed: {}",
                        attempt, MAX_CONNECT_ATTEMPTS, e
                    );
                    if attempt < MAX_CONNECT_ATTEMPTS {
                        let delay = self.retry_base * 2u32.pow(attempt - 1);
                        if wait_or_shutdown(shutdown, delay).await {
                            return ConnectOutcome::Shutdown;
                        }
                    }
                }
            }
        }
        ConnectOutcome::GaveUp("connection retries exhausted")
    }

    async fn session(
        &self,
        stream: WsStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (mut sender, mut receiver) = stream.split();

        let register = ClientMessage::Register {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
        };
        let frame = match serde_json::to_string(&register) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Cannot encode register message: {}", e);
                return SessionEnd::Disconnected;
            }
        };
        if let Err(e) = sender.send(Message::Text(frame)).await {
            warn!("Failed to send register message: {}", e);
            return SessionEnd::Disconnected;
        }
        debug!(
            "Sent register for {} ({})",
            self.device_id, self.device_name
        );

        let media_wait = tokio::time::sleep(self.media_wait);
        tokio::pin!(media_wait);
        let mut media_wait_armed = true;
        let mut failure_signaled = false;

        loop {
            tokio::select! {
                _ = &mut media_wait, if media_wait_armed => {
                    media_wait_armed = false;
                    warn!(
                        "No catalog within {:?} of registering",
                        self.media_wait
                    );
                    self.signal_failure_once(
                        &mut failure_signaled,
                        "timed out waiting for catalog".to_string(),
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return SessionEnd::Shutdown;
                    }
                }
                frame = receiver.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = ServerMessage::parse(&text) {
                            self.handle_message(
                                message,
                                &mut media_wait_armed,
                                &mut failure_signaled,
                            );
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Registration socket error: {}", e);
                        return SessionEnd::Disconnected;
                    }
                }
            }
        }
    }

    fn handle_message(
        &self,
        message: ServerMessage,
        media_wait_armed: &mut bool,
        failure_signaled: &mut bool,
    ) {
        match message {
            ServerMessage::RegisteredSuccess { device_id } => {
                info!(
                    "Upstream acknowledged registration as {}",
                    device_id.as_deref().unwrap_or(&self.device_id)
                );
                // Catalog still pending; the media-wait timer stays armed.
                self.emit_phase(RegistrationPhase::Registered);
            }
            ServerMessage::RegisteredFailed { reason } => {
                let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                warn!("Upstream rejected registration: {}", reason);
                *media_wait_armed = false;
                self.signal_failure_once(
                    failure_signaled,
                    format!("registration rejected: {}", reason),
                );
            }
            ServerMessage::CatalogReady { device_id, data } => {
                *media_wait_armed = false;
                match data.as_ref().and_then(protocol::parse_media_payload) {
                    Some(assets) => {
                        debug!("Inline catalog with {} active assets", assets.len());
                        let _ = self
                            .signal_tx
                            .send(RegistrationSignal::CatalogInline(assets));
                    }
                    None => {
                        let id = device_id.unwrap_or_else(|| self.device_id.clone());
                        debug!("Catalog announced for device {}", id);
                        let _ = self
                            .signal_tx
                            .send(RegistrationSignal::CatalogAnnounced(id));
                    }
                }
            }
            ServerMessage::Blocked { reason } => {
                warn!(
                    "Device blocked by upstream: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
                let _ = self
                    .signal_tx
                    .send(RegistrationSignal::BlockedChanged(true));
            }
            ServerMessage::Unblocked => {
                info!("Device unblocked by upstream");
                let _ = self
                    .signal_tx
                    .send(RegistrationSignal::BlockedChanged(false));
            }
        }
    }

    /// At most one `Failed` signal per session; the media-wait timer and a
    /// rejection frame can otherwise both fire for the same handshake.
    fn signal_failure_once(&self, failure_signaled: &mut bool, reason: String) {
        if *failure_signaled {
            return;
        }
        *failure_signaled = true;
        self.emit_phase(RegistrationPhase::Failed);
        let _ = self.signal_tx.send(RegistrationSignal::Failed(reason));
    }

    fn emit_phase(&self, phase: RegistrationPhase) {
        self.state.broadcast_event(PlayerEvent::RegistrationState {
            phase,
            timestamp: Utc::now(),
        });
    }
}

/// Sleep that loses to shutdown. Returns true when shutdown won.
pub(crate) async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
