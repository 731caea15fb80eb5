//! Circle membership registry.
//!
//! Circles exist only while they have members: the entry is created on
//! first join and deleted when the last peer leaves, so an idle hub
//! holds no state at all.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// One session's outbound queue sender.
#[derive(Clone)]
pub struct Connection {
    pub tx: mpsc::Sender<Message>,
}

#[derive(Default)]
pub struct Circles {
    circles: DashMap<String, DashMap<String, Connection>>,
}

impl Circles {
    pub fn new() -> Self {
        Self { circles: DashMap::new() }
    }

    /// Register a peer; returns the ids of the peers already present.
    /// A second join with the same id replaces the old connection.
    pub fn join(&self, circle_id: &str, peer_id: &str, conn: Connection) -> Vec<String> {
        let members = self
            .circles
            .entry(circle_id.to_owned())
            .or_insert_with(DashMap::new);
        let others: Vec<String> = members
            .iter()
            .filter(|entry| entry.key() != peer_id)
            .map(|entry| entry.key().clone())
            .collect();
        members.insert(peer_id.to_owned(), conn);
        others
    }

    /// Drop a peer; returns the connections of the peers that remain so
    /// the caller can notify them. Deletes the circle when it empties.
    pub fn remove(&self, circle_id: &str, peer_id: &str) -> Vec<(String, Connection)> {
        let Some(members) = self.circles.get(circle_id) else {
            return Vec::new();
        };
        members.remove(peer_id);
        let remaining: Vec<(String, Connection)> = members
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let empty = members.is_empty();
        drop(members);
        if empty {
            // Recheck under the entry lock: a join may have raced us.
            self.circles
                .remove_if(circle_id, |_, members| members.is_empty());
        }
        remaining
    }

    /// Outbound sender for one peer in one circle.
    pub fn peer(&self, circle_id: &str, peer_id: &str) -> Option<Connection> {
        self.circles
            .get(circle_id)
            .and_then(|members| members.get(peer_id).map(|entry| entry.value().clone()))
    }

    /// Number of live circles, for tests and diagnostics.
    pub fn circle_count(&self) -> usize {
        self.circles.len()
    }

    pub fn member_count(&self, circle_id: &str) -> usize {
        self.circles.get(circle_id).map_or(0, |members| members.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let (tx, _rx) = mpsc::channel(1);
        Connection { tx }
    }

    #[test]
    fn join_reports_existing_members_only() {
        let circles = Circles::new();
        assert!(circles.join("c", "a", conn()).is_empty());
        let others = circles.join("c", "b", conn());
        assert_eq!(others, vec!["a".to_owned()]);
    }

    #[test]
    fn empty_circle_is_deleted() {
        let circles = Circles::new();
        circles.join("c", "a", conn());
        assert_eq!(circles.circle_count(), 1);
        let remaining = circles.remove("c", "a");
        assert!(remaining.is_empty());
        assert_eq!(circles.circle_count(), 0);
    }

    #[test]
    fn remove_returns_remaining_peers() {
        let circles = Circles::new();
        circles.join("c", "a", conn());
        circles.join("c", "b", conn());
        let remaining = circles.remove("c", "a");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, "b");
        assert_eq!(circles.circle_count(), 1);
    }
}
