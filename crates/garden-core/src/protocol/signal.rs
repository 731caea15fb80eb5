//! Signaling wire protocol (JSON over WebSocket, hub ⇄ client).
//!
//! The hub never interprets SDP/ICE contents: `offer`, `answer`, and
//! `ice` are relayed verbatim to the `to` peer. This enum classifies
//! inbound messages; relays forward the original text, not a re-encoded
//! copy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `from` value the hub uses for its own replies.
pub const HUB_SENDER: &str = "server";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    /// client→hub: register in a circle.
    Join {
        #[serde(rename = "circleId")]
        circle_id: String,
        #[serde(rename = "peerId")]
        peer_id: String,
    },
    /// hub→client: initial roster, other members only.
    Peers {
        #[serde(default)]
        from: Option<String>,
        data: Vec<String>,
    },
    /// hub→others: new peer notice.
    Joined { from: String },
    /// Opaque SDP offer relay.
    Offer { to: String, from: String, data: Value },
    /// Opaque SDP answer relay.
    Answer { to: String, from: String, data: Value },
    /// Opaque ICE candidate relay.
    Ice { to: String, from: String, data: Value },
    /// client→hub: explicit departure.
    Leave,
    /// hub→others: departure notice.
    Left { from: String },
}

impl SignalMessage {
    /// Roster reply sent to a fresh joiner.
    pub fn peers(others: Vec<String>) -> Self {
        SignalMessage::Peers {
            from: Some(HUB_SENDER.to_owned()),
            data: others,
        }
    }

    /// The recipient for relay kinds, `None` otherwise.
    pub fn relay_target(&self) -> Option<&str> {
        match self {
            SignalMessage::Offer { to, .. }
            | SignalMessage::Answer { to, .. }
            | SignalMessage::Ice { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn msg_type(&self) -> &'static str {
        match self {
            SignalMessage::Join { .. } => "join",
            SignalMessage::Peers { .. } => "peers",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::Ice { .. } => "ice",
            SignalMessage::Leave => "leave",
            SignalMessage::Left { .. } => "left",
        }
    }
}
