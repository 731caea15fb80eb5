//! The single contract the host talks to.
//!
//! Implementations:
//! - [`crate::sim::SimAdapter`] (playground, offline)
//! - [`crate::webrtc::WebRtcAdapter`] (signaling via WS, data via WebRTC)
//! - [`NoopPort`] (no transport configured)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use garden_core::protocol::realtime::{CircleId, MessageEnvelope, Payload, PeerId, Topic};
use garden_core::{GardenError, Result};

/// Connection status of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Handler invoked with the decoded body plus the full envelope, so
/// callers can inspect sender and timestamp.
pub type TopicHandler = Arc<dyn Fn(&Value, &MessageEnvelope) + Send + Sync>;

/// Abstracts the network layer so hosts can run over simulation,
/// WebRTC, or nothing at all without changing caller code.
///
/// A peer never receives its own published messages back: self-echo is
/// suppressed by the adapter, not by the caller.
#[async_trait]
pub trait RealtimePort: Send + Sync {
    /// Current connection status, synchronous.
    fn status(&self) -> PortStatus;

    /// Stable peer id for this adapter's lifetime.
    fn my_peer_id(&self) -> PeerId;

    /// Join a circle. Resolves once the port is usable, or returns an
    /// error (leaving status `Disconnected`) when the handshake fails.
    /// Bounded by the adapter's own timeout — never hangs.
    async fn join_circle(&self, circle_id: CircleId) -> Result<()>;

    /// Tear down all resources for the current circle. No-op when not
    /// joined.
    async fn leave_circle(&self) -> Result<()>;

    /// Fire-and-forget publish to a topic in the current circle. Drops
    /// silently when not connected.
    fn publish(&self, topic: Topic, payload: Payload);

    /// Subscribe to a topic in the current circle. The returned guard
    /// unsubscribes on drop or explicit [`Subscription::cancel`].
    fn subscribe(&self, topic: Topic, handler: TopicHandler) -> Subscription;
}

/// RAII unsubscribe guard. Cancelling twice (or dropping after cancel)
/// is a no-op.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self { detach: Some(Box::new(detach)) }
    }

    /// A guard that does nothing, for ports without a live registry.
    pub fn inert() -> Self {
        Self { detach: None }
    }

    /// Unsubscribe now instead of at drop time.
    pub fn cancel(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Port used when no transport is configured (`kind: none`). Every
/// operation is a safe no-op or rejection.
pub struct NoopPort;

#[async_trait]
impl RealtimePort for NoopPort {
    fn status(&self) -> PortStatus {
        PortStatus::Disconnected
    }

    fn my_peer_id(&self) -> PeerId {
        "peer:noop".to_owned()
    }

    async fn join_circle(&self, _circle_id: CircleId) -> Result<()> {
        Err(GardenError::NotConfigured)
    }

    async fn leave_circle(&self) -> Result<()> {
        Ok(())
    }

    fn publish(&self, _topic: Topic, _payload: Payload) {}

    fn subscribe(&self, _topic: Topic, _handler: TopicHandler) -> Subscription {
        Subscription::inert()
    }
}
