//! Garden realtime: the `RealtimePort` contract, its adapters, and the
//! local broadcast bus.
//!
//! A host selects an adapter kind (sim | webrtc | none), joins a named
//! circle, then publishes and subscribes by topic. Publishing is
//! fire-and-forget by design: there are no acknowledgments and no
//! retries, and a port that is not connected drops silently. Callers
//! that need confirmation must build it above this layer.

pub mod bus;
pub mod factory;
pub mod port;
pub mod sim;
pub mod subscribers;
pub mod webrtc;

pub use bus::{BroadcastRegistry, GardenBroadcaster, Origin};
pub use factory::{create_realtime, RealtimeKind, RealtimeOptions};
pub use port::{NoopPort, PortStatus, RealtimePort, Subscription};
pub use sim::{SimAdapter, SimNetwork};
pub use webrtc::{PeerPhase, WebRtcAdapter, WebRtcConfig};
