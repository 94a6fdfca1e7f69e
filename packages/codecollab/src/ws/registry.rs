//! Connection registry: live socket handles bound to verified identities.
//!
//! Purely in-memory. `resolve` returning `None` means the event came from a
//! connection that never completed admission (or already disconnected) and
//! must be rejected without side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::models::{Identity, UserId};
use crate::ws::protocol::ServerMessage;

/// Unique handle for one live WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

struct Registered {
    identity: Identity,
    sender: ConnectionSender,
    // Monotonic registration order, used to pick the most recent connection
    // when one user has several tabs open.
    seq: u64,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Registered>>,
    next_seq: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an identity and outbound sender to a connection. Last write wins
    /// if called twice for the same id.
    pub async fn register(&self, id: ConnectionId, identity: Identity, sender: ConnectionSender) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.connections.write().await.insert(
            id,
            Registered {
                identity,
                sender,
                seq,
            },
        );
    }

    pub async fn resolve(&self, id: ConnectionId) -> Option<Identity> {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|r| r.identity.clone())
    }

    pub async fn sender(&self, id: ConnectionId) -> Option<ConnectionSender> {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|r| r.sender.clone())
    }

    pub async fn unregister(&self, id: ConnectionId) -> Option<Identity> {
        self.connections
            .write()
            .await
            .remove(&id)
            .map(|r| r.identity)
    }

    /// Most-recently-registered live connection for a user, if any.
    /// Deterministic target selection for signaling relay under multi-tab.
    pub async fn find_user_connection(
        &self,
        user_id: UserId,
    ) -> Option<(ConnectionId, ConnectionSender)> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, r)| r.identity.user_id == user_id)
            .max_by_key(|(_, r)| r.seq)
            .map(|(id, r)| (*id, r.sender.clone()))
    }

    /// Snapshot the senders for a set of connections. Missing ids are simply
    /// absent from the result; the caller skips them.
    pub async fn senders_for(
        &self,
        ids: &[ConnectionId],
    ) -> Vec<(ConnectionId, ConnectionSender)> {
        let map = self.connections.read().await;
        ids.iter()
            .filter_map(|id| map.get(id).map(|r| (*id, r.sender.clone())))
            .collect()
    }
}
