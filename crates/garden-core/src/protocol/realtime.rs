//! Realtime message envelope (v1).
//!
//! The lower-level wrapper used by `RealtimePort` adapters for topic
//! traffic inside a circle. Distinct from the Garden envelope: this one
//! carries transport routing (circle, sender peer id) and an arbitrary
//! JSON body.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::now_ms;

/// Fixed integer version for realtime envelopes.
pub const REALTIME_PROTOCOL_VERSION: u8 = 1;

/// A named room grouping peers.
pub type CircleId = String;
/// Transport-level participant id.
pub type PeerId = String;

/// Fixed set of topics within a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Presence,
    Scenes,
    Pads,
    Assets,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Presence => "presence",
            Topic::Scenes => "scenes",
            Topic::Pads => "pads",
            Topic::Assets => "assets",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the namespaced event name for a (circle, topic) pair,
/// e.g. `presence:firecircle`.
pub fn ns(circle_id: &str, topic: Topic) -> String {
    format!("{topic}:{circle_id}")
}

/// Versioned envelope for all realtime messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub v: u8,
    #[serde(rename = "type")]
    pub topic: Topic,
    #[serde(rename = "circleId")]
    pub circle_id: CircleId,
    pub sender: PeerId,
    /// Milliseconds since epoch.
    pub ts: u64,
    pub body: Value,
}

/// Stamp an envelope with the current version and send time.
pub fn seal(circle_id: &str, sender: &str, topic: Topic, body: Value) -> MessageEnvelope {
    MessageEnvelope {
        v: REALTIME_PROTOCOL_VERSION,
        topic,
        circle_id: circle_id.to_owned(),
        sender: sender.to_owned(),
        ts: now_ms(),
        body,
    }
}

/// Version-gated decode. `None` for bad JSON, unknown topics, or a
/// version other than [`REALTIME_PROTOCOL_VERSION`].
pub fn open(text: &str) -> Option<MessageEnvelope> {
    let env: MessageEnvelope = serde_json::from_str(text).ok()?;
    if env.v != REALTIME_PROTOCOL_VERSION {
        return None;
    }
    Some(env)
}

/// What callers hand to `publish`: a JSON body or pre-encoded bytes.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Bytes(Bytes),
}

impl Payload {
    /// Resolve to the envelope body. Byte payloads must decode as JSON;
    /// otherwise the publish is dropped.
    pub fn into_body(self) -> Option<Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Bytes(b) => decode_json(&b),
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

/// Encode a JSON value to UTF-8 bytes.
pub fn encode_json(value: &Value) -> Bytes {
    Bytes::from(value.to_string())
}

/// Decode UTF-8 JSON bytes; `None` when undecodable.
pub fn decode_json(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice(bytes).ok()
}
