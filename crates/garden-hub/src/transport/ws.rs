//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS, rejecting disallowed origins with close 1008
//! - Track circle membership for the session's one registered peer
//! - Relay offer/answer/ice frames to their target, verbatim
//! - Broadcast joined/left notices to the rest of the circle
//!
//! Relays forward the original text rather than a re-encoded copy, so
//! the hub stays byte-transparent to whatever SDP/ICE shapes clients
//! exchange.
//!
//! Cross-session delivery never waits: a frame for a peer whose queue
//! is full (or whose session is gone) is dropped, keeping one slow
//! consumer from stalling another session's loop.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use garden_core::protocol::signal::SignalMessage;
use garden_core::POLICY_CLOSE_CODE;

use crate::app_state::AppState;
use crate::state::Connection;

/// One registered peer per socket.
type Registration = Option<(String, String)>;

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if !app.origins().allows(origin.as_deref()) {
        tracing::warn!(origin = origin.as_deref().unwrap_or("-"), "origin rejected");
        return ws.on_upgrade(|mut socket| async move {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: POLICY_CLOSE_CODE,
                    reason: "origin not allowed".into(),
                })))
                .await;
        });
    }

    ws.on_upgrade(move |socket| run_session(app, socket))
}

async fn run_session(app: AppState, socket: WebSocket) {
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut registered: Registration = None;

    loop {
        tokio::select! {
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(m) => {
                        if ws_tx.send(m).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(text) => {
                        handle_text(&app, &out_tx, &mut registered, text).await;
                    }
                    Message::Close(_) => break,
                    // Pings are answered by axum; binary frames have no
                    // meaning on the signaling channel.
                    _ => {}
                }
            }
        }
    }

    if let Some((circle, peer)) = registered.take() {
        depart(&app, &circle, &peer);
    }
}

async fn handle_text(
    app: &AppState,
    out_tx: &mpsc::Sender<Message>,
    registered: &mut Registration,
    raw: String,
) {
    let Ok(msg) = serde_json::from_str::<SignalMessage>(&raw) else {
        tracing::debug!("unparseable signaling frame dropped");
        return;
    };

    match msg {
        SignalMessage::Join { circle_id, peer_id } => {
            if let Some((old_circle, old_peer)) = registered.take() {
                depart(app, &old_circle, &old_peer);
            }

            let others = app
                .circles()
                .join(&circle_id, &peer_id, Connection { tx: out_tx.clone() });

            let roster = SignalMessage::peers(others.clone());
            if let Ok(text) = serde_json::to_string(&roster) {
                let _ = out_tx.send(Message::Text(text)).await;
            }

            let notice = SignalMessage::Joined { from: peer_id.clone() };
            if let Ok(text) = serde_json::to_string(&notice) {
                for other in &others {
                    if let Some(conn) = app.circles().peer(&circle_id, other) {
                        if conn.tx.try_send(Message::Text(text.clone())).is_err() {
                            tracing::debug!(peer = %other, "joined notice dropped: queue full");
                        }
                    }
                }
            }

            tracing::info!(circle = %circle_id, peer = %peer_id, "peer joined");
            *registered = Some((circle_id, peer_id));
        }

        relay @ (SignalMessage::Offer { .. }
        | SignalMessage::Answer { .. }
        | SignalMessage::Ice { .. }) => {
            let Some((circle, _)) = registered.as_ref() else {
                tracing::debug!(kind = relay.msg_type(), "relay before join dropped");
                return;
            };
            let Some(to) = relay.relay_target() else { return };
            match app.circles().peer(circle, to) {
                Some(conn) => {
                    // Verbatim relay: the original frame, not a re-encode.
                    if conn.tx.try_send(Message::Text(raw)).is_err() {
                        tracing::debug!(kind = relay.msg_type(), target = %to, "relay dropped: queue full");
                    }
                }
                None => {
                    tracing::debug!(kind = relay.msg_type(), target = %to, "relay target not in circle");
                }
            }
        }

        SignalMessage::Leave => {
            if let Some((circle, peer)) = registered.take() {
                depart(app, &circle, &peer);
            }
        }

        // Hub-origin kinds arriving from a client are ignored.
        SignalMessage::Peers { .. } | SignalMessage::Joined { .. } | SignalMessage::Left { .. } => {
            tracing::debug!(kind = msg.msg_type(), "hub-origin frame from client ignored");
        }
    }
}

/// Remove a peer and tell everyone still in the circle.
fn depart(app: &AppState, circle: &str, peer: &str) {
    let remaining = app.circles().remove(circle, peer);
    let notice = SignalMessage::Left { from: peer.to_owned() };
    if let Ok(text) = serde_json::to_string(&notice) {
        for (other, conn) in remaining {
            if conn.tx.try_send(Message::Text(text.clone())).is_err() {
                tracing::debug!(peer = %other, "left notice dropped: queue full");
            }
        }
    }
    tracing::info!(circle = %circle, peer = %peer, "peer left");
}
