//! Topic subscription registry shared by adapters.
//!
//! Handlers are invoked synchronously in registration order. A handler
//! that panics is caught at the dispatch site so one bad subscriber
//! cannot break delivery to the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use garden_core::protocol::realtime::{MessageEnvelope, Topic};

use crate::port::TopicHandler;

#[derive(Default)]
pub struct SubscriberTable {
    topics: DashMap<Topic, Vec<(u64, TopicHandler)>>,
    seq: AtomicU64,
}

impl SubscriberTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            topics: DashMap::new(),
            seq: AtomicU64::new(1),
        })
    }

    pub fn insert(&self, topic: Topic, handler: TopicHandler) -> u64 {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.topics.entry(topic).or_default().push((id, handler));
        id
    }

    /// Idempotent: removing an unknown id is a no-op.
    pub fn remove(&self, topic: Topic, id: u64) {
        if let Some(mut entry) = self.topics.get_mut(&topic) {
            entry.retain(|(hid, _)| *hid != id);
        }
    }

    /// Invoke every handler registered for the envelope's topic.
    pub fn dispatch(&self, env: &MessageEnvelope) {
        // Clone out of the map first: a handler may subscribe or
        // unsubscribe re-entrantly, which would deadlock on the shard.
        let handlers: Vec<TopicHandler> = match self.topics.get(&env.topic) {
            Some(entry) => entry.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return,
        };
        for handler in handlers {
            let result = catch_unwind(AssertUnwindSafe(|| handler(&env.body, env)));
            if result.is_err() {
                tracing::warn!(topic = %env.topic, "subscriber panicked; continuing delivery");
            }
        }
    }
}
