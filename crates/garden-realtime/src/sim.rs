//! Simulation adapter: an in-memory realtime port for local testing
//! and playground use.
//!
//! Multiple adapters sharing one [`SimNetwork`] behave as independent
//! peers on a shared network, which makes multi-peer scenarios testable
//! in a single process. The network handle is injected explicitly so
//! tests get isolated networks instead of leaking state through an
//! implicit global; hosts that want the process-wide default can use
//! [`SimNetwork::shared`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use serde_json::json;

use garden_core::protocol::realtime::{
    ns, seal, CircleId, MessageEnvelope, Payload, PeerId, Topic,
};
use garden_core::Result;

use crate::port::{PortStatus, RealtimePort, Subscription, TopicHandler};

type SimSink = Arc<dyn Fn(&MessageEnvelope) + Send + Sync>;

/// Shared in-memory event dispatcher. Each `(circle, topic)` pair maps
/// to a distinct event name (see [`ns`]); emitting delivers
/// synchronously to every sink attached to that name.
#[derive(Default)]
pub struct SimNetwork {
    sinks: DashMap<String, Vec<(u64, SimSink)>>,
    seq: AtomicU64,
}

impl SimNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Process-wide default network.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<SimNetwork>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(SimNetwork::new))
    }

    fn attach(&self, event: &str, sink: SimSink) -> u64 {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.sinks.entry(event.to_owned()).or_default().push((id, sink));
        id
    }

    fn detach(&self, event: &str, id: u64) {
        if let Some(mut entry) = self.sinks.get_mut(event) {
            entry.retain(|(sid, _)| *sid != id);
        }
    }

    fn emit(&self, event: &str, env: &MessageEnvelope) {
        // Snapshot before dispatching: a sink may re-enter attach/detach.
        let sinks: Vec<SimSink> = match self.sinks.get(event) {
            Some(entry) => entry.iter().map(|(_, s)| Arc::clone(s)).collect(),
            None => return,
        };
        for sink in sinks {
            if catch_unwind(AssertUnwindSafe(|| sink(env))).is_err() {
                tracing::warn!(event, "sim sink panicked; continuing delivery");
            }
        }
    }
}

fn new_peer_id() -> PeerId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(5)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("peer:sim-{n:x}-{suffix}")
}

/// Artificial handshake latency applied by [`SimAdapter::join_circle`],
/// so UI and tests see a realistic connecting phase.
pub const DEFAULT_JOIN_DELAY: Duration = Duration::from_millis(120);

pub struct SimAdapter {
    peer_id: PeerId,
    network: Arc<SimNetwork>,
    join_delay: Duration,
    circle_id: Mutex<Option<CircleId>>,
    status: Mutex<PortStatus>,
}

impl SimAdapter {
    pub fn new(network: Arc<SimNetwork>) -> Arc<Self> {
        Self::with_join_delay(network, DEFAULT_JOIN_DELAY)
    }

    pub fn with_join_delay(network: Arc<SimNetwork>, join_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            peer_id: new_peer_id(),
            network,
            join_delay,
            circle_id: Mutex::new(None),
            status: Mutex::new(PortStatus::Disconnected),
        })
    }

    fn set_status(&self, status: PortStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = status;
        }
    }

    fn current_circle(&self) -> Option<CircleId> {
        self.circle_id.lock().ok().and_then(|g| g.clone())
    }

    fn emit_system(&self, text: &str) {
        if let Some(circle) = self.current_circle() {
            let env = seal(&circle, &self.peer_id, Topic::Presence, json!({"system": text}));
            self.network.emit(&ns(&circle, Topic::Presence), &env);
        }
    }
}

#[async_trait]
impl RealtimePort for SimAdapter {
    fn status(&self) -> PortStatus {
        self.status.lock().map(|g| *g).unwrap_or(PortStatus::Disconnected)
    }

    fn my_peer_id(&self) -> PeerId {
        self.peer_id.clone()
    }

    async fn join_circle(&self, circle_id: CircleId) -> Result<()> {
        if let Ok(mut guard) = self.circle_id.lock() {
            *guard = Some(circle_id.clone());
        }
        self.set_status(PortStatus::Connecting);
        tokio::time::sleep(self.join_delay).await;
        self.set_status(PortStatus::Connected);
        self.emit_system(&format!("joined circle {circle_id}"));
        Ok(())
    }

    async fn leave_circle(&self) -> Result<()> {
        if let Some(circle) = self.current_circle() {
            self.emit_system(&format!("left circle {circle}"));
        }
        if let Ok(mut guard) = self.circle_id.lock() {
            *guard = None;
        }
        self.set_status(PortStatus::Disconnected);
        Ok(())
    }

    fn publish(&self, topic: Topic, payload: Payload) {
        let Some(circle) = self.current_circle() else { return };
        let Some(body) = payload.into_body() else {
            tracing::debug!(%topic, "dropping publish: byte payload is not JSON");
            return;
        };
        let env = seal(&circle, &self.peer_id, topic, body);
        self.network.emit(&ns(&circle, topic), &env);
    }

    fn subscribe(&self, topic: Topic, handler: TopicHandler) -> Subscription {
        let Some(circle) = self.current_circle() else {
            return Subscription::inert();
        };
        let event = ns(&circle, topic);
        let me = self.peer_id.clone();
        let sink: SimSink = Arc::new(move |env: &MessageEnvelope| {
            if env.sender == me {
                return; // never echo our own messages back
            }
            handler(&env.body, env);
        });
        let id = self.network.attach(&event, sink);
        let network = Arc::clone(&self.network);
        Subscription::new(move || network.detach(&event, id))
    }
}
