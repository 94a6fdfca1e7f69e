//! Room subscriber sets: which live connections receive a room's events.
//!
//! Derived, in-memory state. Lost on restart; clients rejoin on reconnect.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::models::RoomId;
use crate::ws::registry::ConnectionId;

#[derive(Default)]
pub struct RoomSubscriptions {
    rooms: RwLock<HashMap<RoomId, HashSet<ConnectionId>>>,
}

impl RoomSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: a set, not a multiset.
    pub async fn subscribe(&self, room_id: RoomId, conn: ConnectionId) {
        self.rooms
            .write()
            .await
            .entry(room_id)
            .or_default()
            .insert(conn);
    }

    /// Returns true if the connection was subscribed.
    pub async fn unsubscribe(&self, room_id: RoomId, conn: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(subscribers) = rooms.get_mut(&room_id) else {
            return false;
        };
        let removed = subscribers.remove(&conn);
        if subscribers.is_empty() {
            rooms.remove(&room_id);
        }
        removed
    }

    /// Drop the connection from every room it was subscribed to, returning
    /// the affected rooms. Used on disconnect.
    pub async fn unsubscribe_all(&self, conn: ConnectionId) -> Vec<RoomId> {
        let mut rooms = self.rooms.write().await;
        let mut affected = Vec::new();
        rooms.retain(|room_id, subscribers| {
            if subscribers.remove(&conn) {
                affected.push(*room_id);
            }
            !subscribers.is_empty()
        });
        affected
    }

    /// Snapshot of a room's subscribers. The caller iterates over the copy so
    /// no lock is held during fan-out.
    pub async fn subscribers(&self, room_id: RoomId) -> Vec<ConnectionId> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn double_subscribe_is_idempotent() {
        let subs = RoomSubscriptions::new();
        let conn = ConnectionId::new();

        subs.subscribe(RoomId(1), conn).await;
        subs.subscribe(RoomId(1), conn).await;

        assert_eq!(subs.subscribers(RoomId(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn last_operation_determines_presence() {
        let subs = RoomSubscriptions::new();
        let conn = ConnectionId::new();

        subs.subscribe(RoomId(1), conn).await;
        assert!(subs.unsubscribe(RoomId(1), conn).await);
        subs.subscribe(RoomId(1), conn).await;

        assert_eq!(subs.subscribers(RoomId(1)).await, vec![conn]);
    }

    #[tokio::test]
    async fn unsubscribe_absent_connection() {
        let subs = RoomSubscriptions::new();
        assert!(!subs.unsubscribe(RoomId(1), ConnectionId::new()).await);
    }

    #[tokio::test]
    async fn unsubscribe_all_clears_every_room() {
        let subs = RoomSubscriptions::new();
        let conn = ConnectionId::new();
        let other = ConnectionId::new();

        subs.subscribe(RoomId(1), conn).await;
        subs.subscribe(RoomId(2), conn).await;
        subs.subscribe(RoomId(2), other).await;

        let mut affected = subs.unsubscribe_all(conn).await;
        affected.sort();
        assert_eq!(affected, vec![RoomId(1), RoomId(2)]);

        assert!(subs.subscribers(RoomId(1)).await.is_empty());
        assert_eq!(subs.subscribers(RoomId(2)).await, vec![other]);
    }
}
