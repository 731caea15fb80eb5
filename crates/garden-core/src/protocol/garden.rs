//! Garden protocol ("g1") envelope codec.
//!
//! A small, forward-compatible envelope for domain signals (pulse,
//! breath, weave, moment, consent) that can travel over any transport
//! that moves JSON. Receivers validate strictly and drop silently: an
//! envelope is well-formed iff the version tag matches exactly, the
//! signal kind is recognized, `ts` is numeric, and a `payload` key is
//! present (its value may be null). Payload bodies are decoded
//! exhaustively against the per-kind schema; a body that fails its
//! schema makes the whole envelope malformed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::now_ms;

/// Fixed protocol tag. Envelopes carrying any other `v` are ignored.
pub const GARDEN_PROTOCOL_VERSION: &str = "g1";

/// Closed enumeration of signal kinds. Extending the protocol means
/// adding a variant here, never a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Pulse,
    Breath,
    Weave,
    Moment,
    Consent,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Pulse => "pulse",
            SignalKind::Breath => "breath",
            SignalKind::Weave => "weave",
            SignalKind::Moment => "moment",
            SignalKind::Consent => "consent",
        }
    }
}

/// Breath cycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathStage {
    Inhale,
    Exhale,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulsePayload {
    pub tick: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreathPayload {
    pub stage: BreathStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    /// Coherence score in 0..1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coherence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<BreathStage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeavePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bead_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentPayload {
    pub id: String,
    /// open | close | interrupted | complete (open set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPayload {
    /// memory | share | telemetry (open set).
    pub scope: String,
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

/// A signal kind paired with its (possibly redacted-away) payload.
///
/// `None` payloads serialize as `"payload": null` — the key is always
/// present on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Pulse(Option<PulsePayload>),
    Breath(Option<BreathPayload>),
    Weave(Option<WeavePayload>),
    Moment(Option<MomentPayload>),
    Consent(Option<ConsentPayload>),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Pulse(_) => SignalKind::Pulse,
            Signal::Breath(_) => SignalKind::Breath,
            Signal::Weave(_) => SignalKind::Weave,
            Signal::Moment(_) => SignalKind::Moment,
            Signal::Consent(_) => SignalKind::Consent,
        }
    }

    /// Same kind, payload nulled out. Used by the bus redactor path.
    pub fn redacted(&self) -> Signal {
        match self {
            Signal::Pulse(_) => Signal::Pulse(None),
            Signal::Breath(_) => Signal::Breath(None),
            Signal::Weave(_) => Signal::Weave(None),
            Signal::Moment(_) => Signal::Moment(None),
            Signal::Consent(_) => Signal::Consent(None),
        }
    }

    /// Payload as a JSON value (`Null` when redacted).
    pub fn payload_value(&self) -> Value {
        fn enc<T: Serialize>(p: &Option<T>) -> Value {
            match p {
                Some(p) => serde_json::to_value(p).unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        match self {
            Signal::Pulse(p) => enc(p),
            Signal::Breath(p) => enc(p),
            Signal::Weave(p) => enc(p),
            Signal::Moment(p) => enc(p),
            Signal::Consent(p) => enc(p),
        }
    }

    /// Exhaustive payload decode for a recognized kind. `Null` payloads
    /// are accepted as redacted; anything else must match the kind's
    /// schema or the signal is rejected.
    pub fn from_parts(kind: SignalKind, payload: Value) -> Option<Signal> {
        fn dec<T: serde::de::DeserializeOwned>(payload: Value) -> Option<Option<T>> {
            if payload.is_null() {
                return Some(None);
            }
            serde_json::from_value(payload).ok().map(Some)
        }
        match kind {
            SignalKind::Pulse => dec(payload).map(Signal::Pulse),
            SignalKind::Breath => dec(payload).map(Signal::Breath),
            SignalKind::Weave => dec(payload).map(Signal::Weave),
            SignalKind::Moment => dec(payload).map(Signal::Moment),
            SignalKind::Consent => dec(payload).map(Signal::Consent),
        }
    }
}

/// Versioned wrapper around a [`Signal`]. The `v` tag is implicit: it
/// is stamped by [`encode_envelope`] and gated by [`parse_envelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct GardenEnvelope {
    /// Milliseconds since epoch.
    pub ts: u64,
    /// Logical sender identity (distinct from any transport peer id).
    pub actor: Option<String>,
    /// Logical context grouping.
    pub scene: Option<String>,
    pub signal: Signal,
}

/// Optional metadata carried through [`create_envelope`].
#[derive(Debug, Clone, Default)]
pub struct EnvelopeMeta {
    pub actor: Option<String>,
    pub scene: Option<String>,
    pub ts: Option<u64>,
}

/// Stamp a new envelope: version + timestamp (send-time unless given).
pub fn create_envelope(signal: Signal, meta: EnvelopeMeta) -> GardenEnvelope {
    GardenEnvelope {
        ts: meta.ts.unwrap_or_else(now_ms),
        actor: meta.actor,
        scene: meta.scene,
        signal,
    }
}

/// Serialize an envelope to its wire JSON value.
pub fn envelope_to_value(env: &GardenEnvelope) -> Value {
    let mut map = Map::new();
    map.insert("v".into(), Value::String(GARDEN_PROTOCOL_VERSION.into()));
    map.insert("type".into(), Value::String(env.signal.kind().as_str().into()));
    map.insert("ts".into(), Value::from(env.ts));
    if let Some(actor) = &env.actor {
        map.insert("actor".into(), Value::String(actor.clone()));
    }
    if let Some(scene) = &env.scene {
        map.insert("scene".into(), Value::String(scene.clone()));
    }
    map.insert("payload".into(), env.signal.payload_value());
    Value::Object(map)
}

/// Encode to the wire string. `decode_envelope(encode_envelope(e))`
/// round-trips for every valid envelope.
pub fn encode_envelope(env: &GardenEnvelope) -> String {
    envelope_to_value(env).to_string()
}

/// Decode from a wire string. `None` on any structural mismatch.
pub fn decode_envelope(text: &str) -> Option<GardenEnvelope> {
    let value: Value = serde_json::from_str(text).ok()?;
    parse_structured(&value)
}

/// Parse a raw value that may be a structured envelope, a JSON string,
/// or a transport wrapper exposing a `data` field holding either of
/// the former. One level of `data` indirection is unwrapped before
/// validation. Never errors: any mismatch yields `None`.
pub fn parse_envelope(value: &Value) -> Option<GardenEnvelope> {
    match value {
        Value::String(text) => decode_envelope(text),
        Value::Object(map) => {
            if let Some(env) = parse_structured(value) {
                return Some(env);
            }
            match map.get("data") {
                Some(Value::String(text)) => decode_envelope(text),
                Some(inner) => parse_structured(inner),
                None => None,
            }
        }
        _ => None,
    }
}

fn parse_structured(value: &Value) -> Option<GardenEnvelope> {
    let map = value.as_object()?;
    if map.get("v")?.as_str()? != GARDEN_PROTOCOL_VERSION {
        return None;
    }
    // Any JSON number counts as numeric; fractional stamps truncate.
    let ts = map.get("ts")?.as_f64()? as u64;
    let kind: SignalKind = serde_json::from_value(map.get("type")?.clone()).ok()?;
    // The payload key must be present even when its value is null.
    let payload = map.get("payload")?.clone();
    let signal = Signal::from_parts(kind, payload)?;
    let actor = map.get("actor").and_then(Value::as_str).map(str::to_owned);
    let scene = map.get("scene").and_then(Value::as_str).map(str::to_owned);
    Some(GardenEnvelope { ts, actor, scene, signal })
}
