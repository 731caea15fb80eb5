//! Shared error type across garden crates.

use thiserror::Error;

/// WebSocket close code sent when a connection is rejected by policy
/// (origin not on the allow-list).
pub const POLICY_CLOSE_CODE: u16 = 1008;

/// Shared result type.
pub type Result<T> = std::result::Result<T, GardenError>;

/// Unified error type used by core, adapters, and the hub.
#[derive(Debug, Error)]
pub enum GardenError {
    /// Input did not match the expected wire shape.
    #[error("malformed: {0}")]
    Malformed(String),
    /// Envelope version tag did not match.
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    /// Rejected by policy (e.g. origin allow-list).
    #[error("not allowed: {0}")]
    NotAllowed(String),
    /// Operation requires a transport that was never configured.
    #[error("realtime port not configured")]
    NotConfigured,
    /// Socket / channel level failure.
    #[error("transport: {0}")]
    Transport(String),
    /// A bounded operation ran out of time.
    #[error("timed out")]
    Timeout,
    #[error("internal: {0}")]
    Internal(String),
}
