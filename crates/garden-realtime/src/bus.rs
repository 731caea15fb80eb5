//! Local broadcast bus: mirrors domain signals across execution
//! contexts sharing one process, the way a browser tab mirrors them
//! over a named broadcast channel.
//!
//! Delivery is best effort. Outbound signals pass a share gate first
//! (privacy policy lives in the host, not here), then an optional
//! redactor, and only then leave the process. A broadcaster built
//! without a registry degrades to local-only delivery instead of
//! failing its callers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use dashmap::DashMap;

use garden_core::protocol::garden::{
    create_envelope, decode_envelope, encode_envelope, EnvelopeMeta, GardenEnvelope, Signal,
    SignalKind,
};

use crate::port::Subscription;

/// Where a delivered packet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Published by this broadcaster instance.
    Local,
    /// Arrived over the broadcast channel from another context.
    Remote,
}

pub type PacketListener = Arc<dyn Fn(&GardenEnvelope, Origin) + Send + Sync>;

/// Predicate deciding whether an outbound signal may leave the local
/// process at all. Returning false suppresses the publish entirely:
/// no local emit, no channel post.
pub type ShareGate = Arc<dyn Fn(&Signal) -> bool + Send + Sync>;

/// Transforms an outbound signal's payload before it leaves the
/// process. Returning `None` nulls the payload but still sends the
/// envelope.
pub type Redactor = Arc<dyn Fn(&Signal) -> Option<Signal> + Send + Sync>;

type ChannelSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Named-channel broadcast primitive. Posting on a channel delivers to
/// every *other* endpoint attached under the same name, never back to
/// the poster — matching platform broadcast-channel semantics.
#[derive(Default)]
pub struct BroadcastRegistry {
    channels: DashMap<String, Vec<(u64, ChannelSink)>>,
    seq: AtomicU64,
}

impl BroadcastRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Process-wide default registry.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<BroadcastRegistry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(BroadcastRegistry::new))
    }

    fn attach(&self, name: &str, sink: ChannelSink) -> u64 {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.channels.entry(name.to_owned()).or_default().push((id, sink));
        id
    }

    fn detach(&self, name: &str, id: u64) {
        if let Some(mut entry) = self.channels.get_mut(name) {
            entry.retain(|(sid, _)| *sid != id);
        }
    }

    fn post(&self, name: &str, from: u64, text: &str) {
        let sinks: Vec<ChannelSink> = match self.channels.get(name) {
            Some(entry) => entry
                .iter()
                .filter(|(sid, _)| *sid != from)
                .map(|(_, s)| Arc::clone(s))
                .collect(),
            None => return,
        };
        for sink in sinks {
            // Failures on the channel are swallowed; delivery is best
            // effort end to end.
            let _ = catch_unwind(AssertUnwindSafe(|| sink(text)));
        }
    }
}

/// Default channel name shared by playground surfaces.
pub const DEFAULT_CHANNEL: &str = "garden";

#[derive(Clone, Default)]
pub struct BroadcasterOptions {
    /// Channel name; [`DEFAULT_CHANNEL`] when unset.
    pub channel: Option<String>,
    pub actor: Option<String>,
    pub scene: Option<String>,
    pub gate: Option<ShareGate>,
    pub redact: Option<Redactor>,
}

struct BusInner {
    listeners: Mutex<Vec<(u64, PacketListener)>>,
    seq: AtomicU64,
    disposed: AtomicBool,
    gate: Mutex<Option<ShareGate>>,
    redact: Mutex<Option<Redactor>>,
    actor: Mutex<Option<String>>,
    scene: Mutex<Option<String>>,
}

impl BusInner {
    fn emit(&self, env: &GardenEnvelope, origin: Origin) {
        let listeners: Vec<PacketListener> = match self.listeners.lock() {
            Ok(guard) => guard.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(env, origin))).is_err() {
                tracing::warn!("broadcast listener panicked; continuing delivery");
            }
        }
    }
}

struct ChannelAttachment {
    registry: Arc<BroadcastRegistry>,
    name: String,
    endpoint: u64,
}

/// Cross-context mirror for Garden protocol envelopes.
pub struct GardenBroadcaster {
    inner: Arc<BusInner>,
    channel: Option<ChannelAttachment>,
}

impl GardenBroadcaster {
    /// Attach to a broadcast registry. Remote envelopes arriving on the
    /// channel are parsed through the codec; invalid ones are dropped.
    pub fn attached(registry: Arc<BroadcastRegistry>, options: BroadcasterOptions) -> Self {
        let inner = Self::make_inner(&options);
        let name = options.channel.unwrap_or_else(|| DEFAULT_CHANNEL.to_owned());

        let sink_inner = Arc::clone(&inner);
        let sink: ChannelSink = Arc::new(move |text: &str| {
            if sink_inner.disposed.load(Ordering::Acquire) {
                return;
            }
            let Some(env) = decode_envelope(text) else { return };
            sink_inner.emit(&env, Origin::Remote);
        });
        let endpoint = registry.attach(&name, sink);

        Self {
            inner,
            channel: Some(ChannelAttachment { registry, name, endpoint }),
        }
    }

    /// No-op channel degrade for contexts without a broadcast
    /// primitive: publishes still reach local listeners.
    pub fn detached(options: BroadcasterOptions) -> Self {
        Self { inner: Self::make_inner(&options), channel: None }
    }

    fn make_inner(options: &BroadcasterOptions) -> Arc<BusInner> {
        Arc::new(BusInner {
            listeners: Mutex::new(Vec::new()),
            seq: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
            gate: Mutex::new(options.gate.clone()),
            redact: Mutex::new(options.redact.clone()),
            actor: Mutex::new(options.actor.clone()),
            scene: Mutex::new(options.scene.clone()),
        })
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Merge actor/scene defaults used when `publish` omits them.
    pub fn update_defaults(&self, meta: EnvelopeMeta) {
        if let (Some(actor), Ok(mut guard)) = (meta.actor, self.inner.actor.lock()) {
            *guard = Some(actor);
        }
        if let (Some(scene), Ok(mut guard)) = (meta.scene, self.inner.scene.lock()) {
            *guard = Some(scene);
        }
    }

    pub fn set_share_gate(&self, gate: Option<ShareGate>) {
        if let Ok(mut guard) = self.inner.gate.lock() {
            *guard = gate;
        }
    }

    pub fn set_redactor(&self, redact: Option<Redactor>) {
        if let Ok(mut guard) = self.inner.redact.lock() {
            *guard = redact;
        }
    }

    /// Gate → redact → post → local emit. When the gate refuses, the
    /// publish is fully suppressed: nothing reaches local listeners and
    /// nothing leaves the process.
    pub fn publish(&self, signal: Signal, meta: EnvelopeMeta) {
        if self.inner.disposed.load(Ordering::Acquire) {
            return;
        }
        let gate = self.inner.gate.lock().ok().and_then(|g| g.clone());
        if let Some(gate) = gate {
            if !gate(&signal) {
                return;
            }
        }
        let redact = self.inner.redact.lock().ok().and_then(|g| g.clone());
        let sanitized = match redact {
            Some(redact) => redact(&signal).unwrap_or_else(|| signal.redacted()),
            None => signal,
        };

        let actor = meta
            .actor
            .or_else(|| self.inner.actor.lock().ok().and_then(|g| g.clone()));
        let scene = meta
            .scene
            .or_else(|| self.inner.scene.lock().ok().and_then(|g| g.clone()));
        let env = create_envelope(sanitized, EnvelopeMeta { actor, scene, ts: meta.ts });

        if let Some(channel) = &self.channel {
            channel
                .registry
                .post(&channel.name, channel.endpoint, &encode_envelope(&env));
        }
        self.inner.emit(&env, Origin::Local);
    }

    /// Listen to every packet, local and remote.
    pub fn on_packet(&self, listener: PacketListener) -> Subscription {
        let id = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.inner.listeners.lock() {
            guard.push((id, listener));
        }
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            if let Ok(mut guard) = inner.listeners.lock() {
                guard.retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Listen to one signal kind.
    pub fn on(
        &self,
        kind: SignalKind,
        listener: impl Fn(&GardenEnvelope, Origin) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_packet(Arc::new(move |env, origin| {
            if env.signal.kind() == kind {
                listener(env, origin);
            }
        }))
    }

    /// Idempotent: detaches from the channel and clears all listeners.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(channel) = &self.channel {
            channel.registry.detach(&channel.name, channel.endpoint);
        }
        if let Ok(mut guard) = self.inner.listeners.lock() {
            guard.clear();
        }
    }
}

impl Drop for GardenBroadcaster {
    fn drop(&mut self) {
        self.dispose();
    }
}
