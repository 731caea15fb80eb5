//! Protocol modules (Garden envelope + realtime envelope + signaling).
//!
//! Three wire formats live here:
//! - Garden protocol ("g1"): the versioned domain-signal envelope that
//!   travels over the local broadcast channel.
//! - Realtime envelope (v1): the lower-level topic message wrapper used
//!   by `RealtimePort` adapters.
//! - Signaling: the JSON messages exchanged with the hub to negotiate
//!   peer data channels.
//!
//! All parsers are panic-free: malformed input yields `None` (receivers
//! drop it silently), never a panic or an exception across the port
//! boundary.

pub mod garden;
pub mod realtime;
pub mod signal;

/// Milliseconds since the Unix epoch, used to stamp envelopes.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
