//! Per-peer connection bookkeeping for the WebRTC adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use garden_core::{GardenError, Result};

/// Lifecycle of one remote peer, as observed by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    Negotiating,
    Connected,
    Closed,
}

/// One `RTCPeerConnection` plus the negotiation state around it.
///
/// ICE candidates may arrive before the SDP exchange completes; the
/// browser buffers those internally but the `webrtc` crate does not,
/// so early candidates are queued here and flushed once the remote
/// description lands.
pub(crate) struct PeerLink {
    pub pc: Arc<RTCPeerConnection>,
    remote_set: AtomicBool,
    pending_ice: tokio::sync::Mutex<Vec<RTCIceCandidateInit>>,
    phase: Mutex<PeerPhase>,
}

fn transport_err(e: webrtc::Error) -> GardenError {
    GardenError::Transport(e.to_string())
}

impl PeerLink {
    pub(crate) async fn connect(ice_servers: &[String]) -> Result<Arc<Self>> {
        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(transport_err)?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media).map_err(transport_err)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(transport_err)?);
        Ok(Arc::new(Self {
            pc,
            remote_set: AtomicBool::new(false),
            pending_ice: tokio::sync::Mutex::new(Vec::new()),
            phase: Mutex::new(PeerPhase::Negotiating),
        }))
    }

    pub(crate) fn phase(&self) -> PeerPhase {
        self.phase.lock().map(|g| *g).unwrap_or(PeerPhase::Closed)
    }

    pub(crate) fn set_phase(&self, phase: PeerPhase) {
        if let Ok(mut guard) = self.phase.lock() {
            *guard = phase;
        }
    }

    /// Apply the remote description and flush any candidates that
    /// arrived ahead of it.
    pub(crate) async fn apply_remote(&self, desc: RTCSessionDescription) -> Result<()> {
        self.pc.set_remote_description(desc).await.map_err(transport_err)?;
        let drained: Vec<RTCIceCandidateInit> = {
            let mut pending = self.pending_ice.lock().await;
            self.remote_set.store(true, Ordering::Release);
            pending.drain(..).collect()
        };
        for init in drained {
            if let Err(e) = self.pc.add_ice_candidate(init).await {
                tracing::debug!(error = %e, "buffered ice candidate rejected");
            }
        }
        Ok(())
    }

    /// Buffer or apply, depending on whether the remote description is
    /// in place yet.
    pub(crate) async fn add_candidate(&self, init: RTCIceCandidateInit) -> Result<()> {
        {
            let mut pending = self.pending_ice.lock().await;
            if !self.remote_set.load(Ordering::Acquire) {
                pending.push(init);
                return Ok(());
            }
        }
        self.pc.add_ice_candidate(init).await.map_err(transport_err)
    }

    pub(crate) async fn close(&self) {
        self.set_phase(PeerPhase::Closed);
        if let Err(e) = self.pc.close().await {
            tracing::debug!(error = %e, "peer connection close failed");
        }
    }
}

/// Session description ⇄ opaque relay JSON (`{type, sdp}`), the shape
/// browser peers put on the wire.
pub(crate) fn description_to_value(desc: &RTCSessionDescription) -> Value {
    json!({
        "type": desc.sdp_type.to_string().to_lowercase(),
        "sdp": desc.sdp,
    })
}

pub(crate) fn offer_from_value(data: &Value) -> Option<RTCSessionDescription> {
    let sdp = data.get("sdp")?.as_str()?;
    RTCSessionDescription::offer(sdp.to_owned()).ok()
}

pub(crate) fn answer_from_value(data: &Value) -> Option<RTCSessionDescription> {
    let sdp = data.get("sdp")?.as_str()?;
    RTCSessionDescription::answer(sdp.to_owned()).ok()
}

/// ICE candidate relay JSON → init struct. Field names match the
/// browser `RTCIceCandidateInit` dictionary.
pub(crate) fn candidate_from_value(data: &Value) -> Option<RTCIceCandidateInit> {
    let candidate = data.get("candidate")?.as_str()?.to_owned();
    if candidate.is_empty() {
        return None;
    }
    Some(RTCIceCandidateInit {
        candidate,
        sdp_mid: data.get("sdpMid").and_then(Value::as_str).map(str::to_owned),
        sdp_mline_index: data
            .get("sdpMLineIndex")
            .and_then(Value::as_u64)
            .map(|i| i as u16),
        username_fragment: data
            .get("usernameFragment")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}
