//! WebRTC mesh adapter: data channels between peers, brokered by a
//! signaling hub over WebSocket.
//!
//! The earlier member of each negotiating pair makes the offer: a
//! joiner offers to every peer already in the roster it receives, and
//! answers offers that arrive later. Message fan-out is per-link — one
//! `garden` data channel per remote peer, no relay server in the data
//! path.

mod link;

pub use link::PeerPhase;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use garden_core::protocol::realtime::{open, seal, CircleId, Payload, PeerId, Topic};
use garden_core::protocol::signal::SignalMessage;
use garden_core::{GardenError, Result};

use crate::port::{PortStatus, RealtimePort, Subscription, TopicHandler};
use crate::subscribers::SubscriberTable;
use link::PeerLink;

/// Label of the single data channel carried by every peer link.
const DATA_CHANNEL_LABEL: &str = "garden";

/// Outbound signaling queue depth; joins, offers and candidate bursts
/// all fit comfortably.
const SIGNAL_QUEUE: usize = 64;

#[derive(Debug, Clone)]
pub struct WebRtcConfig {
    /// Signaling hub WebSocket URL.
    pub signal_url: String,
    /// Fixed peer id; generated (`peer:rtc-…`) when unset.
    pub peer_id: Option<PeerId>,
    /// STUN/TURN server URLs handed to every peer connection.
    pub ice_servers: Vec<String>,
    /// Upper bound on the signaling dial in [`RealtimePort::join_circle`].
    pub join_timeout: Duration,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            signal_url: "wss://signal.firecircle.dev".to_owned(),
            peer_id: None,
            ice_servers: vec!["stun:stun.l.google.com:19302".to_owned()],
            join_timeout: Duration::from_secs(10),
        }
    }
}

fn new_peer_id() -> PeerId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("peer:rtc-{n:x}{suffix}")
}

struct Inner {
    cfg: WebRtcConfig,
    peer_id: PeerId,
    status: Mutex<PortStatus>,
    circle_id: Mutex<Option<CircleId>>,
    subscribers: Arc<SubscriberTable>,
    links: DashMap<PeerId, Arc<PeerLink>>,
    channels: DashMap<PeerId, Arc<RTCDataChannel>>,
    signal_tx: Mutex<Option<mpsc::Sender<SignalMessage>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn set_status(&self, status: PortStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = status;
        }
    }

    fn current_circle(&self) -> Option<CircleId> {
        self.circle_id.lock().ok().and_then(|g| g.clone())
    }

    fn signal_sender(&self) -> Option<mpsc::Sender<SignalMessage>> {
        match self.signal_tx.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }

    async fn send_signal(&self, msg: SignalMessage) {
        if let Some(tx) = self.signal_sender() {
            if tx.send(msg).await.is_err() {
                tracing::debug!("signaling writer gone; message dropped");
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut guard) = self.tasks.lock() {
            guard.push(handle);
        }
    }

    fn drop_peer(&self, peer: &PeerId) {
        self.channels.remove(peer);
        if let Some((_, link)) = self.links.remove(peer) {
            tokio::spawn(async move { link.close().await });
        }
    }
}

/// Mesh adapter over one signaling session. Create with
/// [`WebRtcAdapter::new`], then drive it through [`RealtimePort`].
pub struct WebRtcAdapter {
    inner: Arc<Inner>,
}

impl WebRtcAdapter {
    pub fn new(cfg: WebRtcConfig) -> Arc<Self> {
        let peer_id = cfg.peer_id.clone().unwrap_or_else(new_peer_id);
        Arc::new(Self {
            inner: Arc::new(Inner {
                cfg,
                peer_id,
                status: Mutex::new(PortStatus::Disconnected),
                circle_id: Mutex::new(None),
                subscribers: SubscriberTable::new(),
                links: DashMap::new(),
                channels: DashMap::new(),
                signal_tx: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Negotiation phase of every known remote peer, for diagnostics.
    pub fn peer_states(&self) -> Vec<(PeerId, PeerPhase)> {
        self.inner
            .links
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().phase()))
            .collect()
    }
}

#[async_trait]
impl RealtimePort for WebRtcAdapter {
    fn status(&self) -> PortStatus {
        self.inner
            .status
            .lock()
            .map(|g| *g)
            .unwrap_or(PortStatus::Disconnected)
    }

    fn my_peer_id(&self) -> PeerId {
        self.inner.peer_id.clone()
    }

    async fn join_circle(&self, circle_id: CircleId) -> Result<()> {
        self.inner.set_status(PortStatus::Connecting);
        if let Ok(mut guard) = self.inner.circle_id.lock() {
            *guard = Some(circle_id.clone());
        }

        let dial = tokio::time::timeout(
            self.inner.cfg.join_timeout,
            connect_async(self.inner.cfg.signal_url.as_str()),
        );
        let (ws, _response) = match dial.await {
            Err(_) => {
                self.inner.set_status(PortStatus::Disconnected);
                return Err(GardenError::Timeout);
            }
            Ok(Err(e)) => {
                self.inner.set_status(PortStatus::Disconnected);
                return Err(GardenError::Transport(e.to_string()));
            }
            Ok(Ok(pair)) => pair,
        };
        let (mut sink, mut stream) = ws.split();

        let join = SignalMessage::Join {
            circle_id: circle_id.clone(),
            peer_id: self.inner.peer_id.clone(),
        };
        let join_text = serde_json::to_string(&join)
            .map_err(|e| GardenError::Internal(e.to_string()))?;
        sink.send(WsMessage::Text(join_text))
            .await
            .map_err(|e| GardenError::Transport(e.to_string()))?;

        let (tx, mut rx) = mpsc::channel::<SignalMessage>(SIGNAL_QUEUE);
        if let Ok(mut guard) = self.inner.signal_tx.lock() {
            *guard = Some(tx);
        }

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let Ok(text) = serde_json::to_string(&msg) else { continue };
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });
        self.inner.track(writer);

        let reader_inner = Arc::clone(&self.inner);
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let Ok(msg) = serde_json::from_str::<SignalMessage>(&text) else {
                    tracing::debug!("unparseable signaling frame dropped");
                    continue;
                };
                handle_signal(&reader_inner, msg).await;
            }
            tracing::debug!("signaling stream closed");
            reader_inner.set_status(PortStatus::Disconnected);
        });
        self.inner.track(reader);

        self.inner.set_status(PortStatus::Connected);
        tracing::info!(circle = %circle_id, peer = %self.inner.peer_id, "joined circle");
        Ok(())
    }

    async fn leave_circle(&self) -> Result<()> {
        let tx = {
            match self.inner.signal_tx.lock() {
                Ok(mut guard) => guard.take(),
                Err(_) => None,
            }
        };
        if let Some(tx) = tx {
            let _ = tx.send(SignalMessage::Leave).await;
            // Give the writer a beat to flush before teardown.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let channels: Vec<Arc<RTCDataChannel>> = self
            .inner
            .channels
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.inner.channels.clear();
        for dc in channels {
            if let Err(e) = dc.close().await {
                tracing::debug!(error = %e, "data channel close failed");
            }
        }

        let links: Vec<Arc<PeerLink>> = self
            .inner
            .links
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.inner.links.clear();
        for link in links {
            link.close().await;
        }

        let tasks = match self.inner.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            task.abort();
        }

        if let Ok(mut guard) = self.inner.circle_id.lock() {
            *guard = None;
        }
        self.inner.set_status(PortStatus::Disconnected);
        Ok(())
    }

    fn publish(&self, topic: Topic, payload: Payload) {
        if self.status() != PortStatus::Connected {
            return;
        }
        let Some(circle) = self.inner.current_circle() else { return };
        let Some(body) = payload.into_body() else {
            tracing::debug!(%topic, "dropping publish: byte payload is not JSON");
            return;
        };
        let env = seal(&circle, &self.inner.peer_id, topic, body);
        let Ok(text) = serde_json::to_string(&env) else { return };

        for entry in self.inner.channels.iter() {
            if entry.value().ready_state() != RTCDataChannelState::Open {
                continue;
            }
            let dc = Arc::clone(entry.value());
            let text = text.clone();
            tokio::spawn(async move {
                if let Err(e) = dc.send_text(text).await {
                    tracing::debug!(error = %e, "data channel send failed");
                }
            });
        }
    }

    fn subscribe(&self, topic: Topic, handler: TopicHandler) -> Subscription {
        let id = self.inner.subscribers.insert(topic, handler);
        let subscribers = Arc::clone(&self.inner.subscribers);
        Subscription::new(move || subscribers.remove(topic, id))
    }
}

async fn handle_signal(inner: &Arc<Inner>, msg: SignalMessage) {
    match msg {
        SignalMessage::Peers { data, .. } => {
            for peer in data {
                if peer != inner.peer_id {
                    start_offer(inner, peer).await;
                }
            }
        }
        SignalMessage::Joined { from } => {
            // The newcomer offers to us; nothing to do yet.
            tracing::debug!(peer = %from, "peer joined circle");
        }
        SignalMessage::Offer { from, data, .. } => {
            if from != inner.peer_id {
                accept_offer(inner, from, &data).await;
            }
        }
        SignalMessage::Answer { from, data, .. } => {
            let link = inner.links.get(&from).map(|e| Arc::clone(e.value()));
            let Some(link) = link else {
                tracing::debug!(peer = %from, "answer for unknown link dropped");
                return;
            };
            let Some(desc) = link::answer_from_value(&data) else {
                tracing::debug!(peer = %from, "malformed answer dropped");
                return;
            };
            if let Err(e) = link.apply_remote(desc).await {
                tracing::warn!(peer = %from, error = %e, "applying answer failed");
                inner.drop_peer(&from);
            }
        }
        SignalMessage::Ice { from, data, .. } => {
            let link = inner.links.get(&from).map(|e| Arc::clone(e.value()));
            let (Some(link), Some(init)) = (link, link::candidate_from_value(&data)) else {
                return;
            };
            if let Err(e) = link.add_candidate(init).await {
                tracing::debug!(peer = %from, error = %e, "ice candidate rejected");
            }
        }
        SignalMessage::Left { from } => {
            tracing::debug!(peer = %from, "peer left circle");
            inner.drop_peer(&from);
        }
        // Client→hub kinds are never echoed back to us; ignore defensively.
        SignalMessage::Join { .. } | SignalMessage::Leave => {}
    }
}

/// Offerer side: we were already pointed at `peer` by the roster.
async fn start_offer(inner: &Arc<Inner>, peer: PeerId) {
    let link = match PeerLink::connect(&inner.cfg.ice_servers).await {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "peer connection setup failed");
            return;
        }
    };
    inner.links.insert(peer.clone(), Arc::clone(&link));
    wire_link(inner, &link, &peer);

    let dc = match link.pc.create_data_channel(DATA_CHANNEL_LABEL, None).await {
        Ok(dc) => dc,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "data channel creation failed");
            inner.drop_peer(&peer);
            return;
        }
    };
    attach_channel(inner, peer.clone(), dc);

    let offer = match link.pc.create_offer(None).await {
        Ok(offer) => offer,
        Err(e) => {
            tracing::warn!(peer = %peer, error = %e, "offer creation failed");
            inner.drop_peer(&peer);
            return;
        }
    };
    if let Err(e) = link.pc.set_local_description(offer.clone()).await {
        tracing::warn!(peer = %peer, error = %e, "setting local offer failed");
        inner.drop_peer(&peer);
        return;
    }
    inner
        .send_signal(SignalMessage::Offer {
            to: peer,
            from: inner.peer_id.clone(),
            data: link::description_to_value(&offer),
        })
        .await;
}

/// Answerer side: a peer that saw our `joined` notice sent us an offer.
async fn accept_offer(inner: &Arc<Inner>, from: PeerId, data: &Value) {
    let Some(desc) = link::offer_from_value(data) else {
        tracing::debug!(peer = %from, "malformed offer dropped");
        return;
    };
    let link = match PeerLink::connect(&inner.cfg.ice_servers).await {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!(peer = %from, error = %e, "peer connection setup failed");
            return;
        }
    };
    inner.links.insert(from.clone(), Arc::clone(&link));
    wire_link(inner, &link, &from);

    let dc_inner = Arc::downgrade(inner);
    let dc_peer = from.clone();
    link.pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let dc_inner = dc_inner.clone();
        let dc_peer = dc_peer.clone();
        Box::pin(async move {
            if let Some(inner) = dc_inner.upgrade() {
                attach_channel(&inner, dc_peer, dc);
            }
        })
    }));

    if let Err(e) = link.apply_remote(desc).await {
        tracing::warn!(peer = %from, error = %e, "applying offer failed");
        inner.drop_peer(&from);
        return;
    }
    let answer = match link.pc.create_answer(None).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(peer = %from, error = %e, "answer creation failed");
            inner.drop_peer(&from);
            return;
        }
    };
    if let Err(e) = link.pc.set_local_description(answer.clone()).await {
        tracing::warn!(peer = %from, error = %e, "setting local answer failed");
        inner.drop_peer(&from);
        return;
    }
    inner
        .send_signal(SignalMessage::Answer {
            to: from,
            from: inner.peer_id.clone(),
            data: link::description_to_value(&answer),
        })
        .await;
}

/// ICE trickle + connection state tracking for one link.
fn wire_link(inner: &Arc<Inner>, link: &Arc<PeerLink>, peer: &PeerId) {
    let tx = inner.signal_sender();
    let me = inner.peer_id.clone();
    let to = peer.clone();
    link.pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let tx = tx.clone();
        let me = me.clone();
        let to = to.clone();
        Box::pin(async move {
            let Some(c) = candidate else { return };
            let Ok(init) = c.to_json() else { return };
            let data = serde_json::to_value(&init).unwrap_or(Value::Null);
            if let Some(tx) = tx {
                let _ = tx
                    .send(SignalMessage::Ice { to, from: me, data })
                    .await;
            }
        })
    }));

    // The state handler must not keep the link (and thus the pc) alive.
    let phase_inner: Weak<Inner> = Arc::downgrade(inner);
    let phase_peer = peer.clone();
    link.pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        let phase_inner = phase_inner.clone();
        let phase_peer = phase_peer.clone();
        Box::pin(async move {
            tracing::debug!(peer = %phase_peer, ?state, "peer connection state");
            let Some(inner) = phase_inner.upgrade() else { return };
            let link = inner.links.get(&phase_peer).map(|e| Arc::clone(e.value()));
            let Some(link) = link else { return };
            match state {
                RTCPeerConnectionState::Connected => link.set_phase(PeerPhase::Connected),
                RTCPeerConnectionState::Failed
                | RTCPeerConnectionState::Closed
                | RTCPeerConnectionState::Disconnected => {
                    link.set_phase(PeerPhase::Closed);
                    inner.channels.remove(&phase_peer);
                }
                _ => {}
            }
        })
    }));
}

/// Hook up one data channel: inbound envelopes go through the
/// subscriber table, closures drop the channel from the fan-out set.
fn attach_channel(inner: &Arc<Inner>, peer: PeerId, dc: Arc<RTCDataChannel>) {
    inner.channels.insert(peer.clone(), Arc::clone(&dc));

    let open_peer = peer.clone();
    dc.on_open(Box::new(move || {
        tracing::debug!(peer = %open_peer, "data channel open");
        Box::pin(async {})
    }));

    let msg_inner: Weak<Inner> = Arc::downgrade(inner);
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let msg_inner = msg_inner.clone();
        Box::pin(async move {
            if !msg.is_string {
                return;
            }
            let Ok(text) = String::from_utf8(msg.data.to_vec()) else { return };
            let Some(inner) = msg_inner.upgrade() else { return };
            let Some(env) = open(&text) else { return };
            if env.sender == inner.peer_id {
                return; // never echo our own messages back
            }
            inner.subscribers.dispatch(&env);
        })
    }));

    let close_inner: Weak<Inner> = Arc::downgrade(inner);
    let close_peer = peer;
    dc.on_close(Box::new(move || {
        let close_inner = close_inner.clone();
        let close_peer = close_peer.clone();
        Box::pin(async move {
            tracing::debug!(peer = %close_peer, "data channel closed");
            if let Some(inner) = close_inner.upgrade() {
                inner.channels.remove(&close_peer);
            }
        })
    }));
}
