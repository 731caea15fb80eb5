//! Adapter selection. Hosts pick a kind explicitly; there is no
//! ambient global port.

use std::sync::Arc;

use crate::port::{NoopPort, RealtimePort};
use crate::sim::{SimAdapter, SimNetwork};
use crate::webrtc::{WebRtcAdapter, WebRtcConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealtimeKind {
    #[default]
    Sim,
    Webrtc,
    None,
}

#[derive(Default)]
pub struct RealtimeOptions {
    pub kind: RealtimeKind,
    /// Required for [`RealtimeKind::Webrtc`]; ignored otherwise. A
    /// missing config degrades to the no-op port rather than panicking.
    pub webrtc: Option<WebRtcConfig>,
    /// Network for [`RealtimeKind::Sim`]; the process-wide shared
    /// network when unset.
    pub sim_network: Option<Arc<SimNetwork>>,
}

pub fn create_realtime(options: RealtimeOptions) -> Arc<dyn RealtimePort> {
    match options.kind {
        RealtimeKind::Sim => {
            let network = options.sim_network.unwrap_or_else(SimNetwork::shared);
            SimAdapter::new(network)
        }
        RealtimeKind::Webrtc => match options.webrtc {
            Some(cfg) => WebRtcAdapter::new(cfg),
            None => {
                tracing::warn!("webrtc selected without a config; using noop port");
                Arc::new(NoopPort)
            }
        },
        RealtimeKind::None => Arc::new(NoopPort),
    }
}
