//! Room event router: resolves the acting identity, applies side effects
//! through the repository, and fans events out to subscriber connections.
//!
//! The router holds no durable state of its own. Identity lives in the
//! registry, room state in SQLite, and only the room to subscribers map here.
//! Subscriber and sender snapshots are taken before any repository call so no
//! in-memory lock is held across storage latency.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;
use crate::models::{Identity, RoomId, RoomUser, UserId};
use crate::repository::CollabRepository;
use crate::ws::protocol::{ClientMessage, CursorPosition, ServerMessage};
use crate::ws::registry::{ConnectionId, ConnectionRegistry};
use crate::ws::signaling::{RelayError, SignalKind, SignalingRelay};
use crate::ws::subscriptions::RoomSubscriptions;

pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    subscriptions: RoomSubscriptions,
    repository: CollabRepository,
    relay: SignalingRelay,
    metrics: Arc<ServerMetrics>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        repository: CollabRepository,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        let relay = SignalingRelay::new(registry.clone());
        Self {
            registry,
            subscriptions: RoomSubscriptions::new(),
            repository,
            relay,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Dispatch one inbound event from a connection.
    pub async fn handle(&self, conn: ConnectionId, message: ClientMessage) {
        let Some(identity) = self.registry.resolve(conn).await else {
            self.reject_unauthenticated(conn, &message).await;
            return;
        };

        match message {
            ClientMessage::Join { room_id } => self.handle_join(conn, &identity, room_id).await,
            ClientMessage::Leave { room_id } => self.handle_leave(conn, &identity, room_id).await,
            ClientMessage::CodeChange { room_id, code } => {
                self.handle_code_change(conn, &identity, room_id, code).await
            }
            ClientMessage::LanguageChange { room_id, language } => {
                self.handle_language_change(&identity, room_id, language).await
            }
            ClientMessage::ChatMessage { room_id, message } => {
                self.handle_chat(&identity, room_id, message).await
            }
            ClientMessage::CursorPosition { room_id, position } => {
                self.handle_cursor(conn, &identity, room_id, position).await
            }
            ClientMessage::VideoOffer {
                target_user_id,
                offer,
                ..
            } => {
                self.handle_signal(conn, &identity, SignalKind::Offer, target_user_id, offer)
                    .await
            }
            ClientMessage::VideoAnswer {
                target_user_id,
                answer,
                ..
            } => {
                self.handle_signal(conn, &identity, SignalKind::Answer, target_user_id, answer)
                    .await
            }
            ClientMessage::IceCandidate {
                target_user_id,
                candidate,
                ..
            } => {
                self.handle_signal(
                    conn,
                    &identity,
                    SignalKind::IceCandidate,
                    target_user_id,
                    candidate,
                )
                .await
            }
            ClientMessage::GetMyUserId => {
                self.send_to(conn, ServerMessage::YourUserId {
                    user_id: identity.user_id,
                })
                .await;
            }
            ClientMessage::GetUsers { room_id } => self.handle_get_users(conn, room_id).await,
            ClientMessage::GetUsername { user_id } => {
                self.handle_get_username(conn, user_id).await
            }
        }
    }

    /// Disconnect: drop the registry binding and every room subscription.
    /// No user-left broadcast; clients rejoin on reconnect.
    pub async fn handle_disconnect(&self, conn: ConnectionId) {
        let identity = self.registry.unregister(conn).await;
        let rooms = self.subscriptions.unsubscribe_all(conn).await;
        if let Some(identity) = identity {
            debug!(
                conn_id = %conn,
                user_id = %identity.user_id,
                rooms = rooms.len(),
                "connection closed"
            );
        }
    }

    async fn handle_join(&self, conn: ConnectionId, identity: &Identity, room_id: RoomId) {
        let room = match self.repository.get_room(room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.send_error(conn, "Room not found").await;
                return;
            }
            Err(e) => {
                self.storage_failure(conn, room_id, "join", e).await;
                return;
            }
        };

        if let Err(e) = self.repository.ensure_member(room_id, identity.user_id).await {
            self.storage_failure(conn, room_id, "join", e).await;
            return;
        }

        let users = match self.repository.list_members(room_id).await {
            Ok(users) => users,
            Err(e) => {
                self.storage_failure(conn, room_id, "join", e).await;
                return;
            }
        };

        self.subscriptions.subscribe(room_id, conn).await;

        self.broadcast(
            room_id,
            ServerMessage::UserJoined {
                user: RoomUser {
                    id: identity.user_id,
                    username: identity.username.clone(),
                },
                message: format!("{} has joined the room", identity.username),
                timestamp: Utc::now().to_rfc3339(),
            },
            None,
        )
        .await;

        self.send_to(conn, ServerMessage::SyncCode {
            code: room.code,
            language: room.language,
            users,
        })
        .await;
    }

    async fn handle_leave(&self, conn: ConnectionId, identity: &Identity, room_id: RoomId) {
        if !self.subscriptions.unsubscribe(room_id, conn).await {
            debug!(conn_id = %conn, room_id = %room_id, "leave for room not subscribed");
            return;
        }

        self.broadcast(
            room_id,
            ServerMessage::UserLeft {
                user_id: identity.user_id,
                username: identity.username.clone(),
                message: format!("{} has left the room", identity.username),
                timestamp: Utc::now().to_rfc3339(),
            },
            None,
        )
        .await;
    }

    async fn handle_code_change(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        room_id: RoomId,
        code: String,
    ) {
        match self.repository.set_code(room_id, &code).await {
            Ok(true) => {}
            Ok(false) => {
                // Fire-and-forget event against a deleted room. Drop quietly.
                debug!(room_id = %room_id, "code-change for missing room");
                return;
            }
            Err(e) => {
                self.storage_failure(conn, room_id, "code-change", e).await;
                return;
            }
        }

        self.broadcast(
            room_id,
            ServerMessage::CodeUpdate {
                code,
                user_id: identity.user_id,
            },
            Some(conn),
        )
        .await;
    }

    async fn handle_language_change(
        &self,
        identity: &Identity,
        room_id: RoomId,
        language: String,
    ) {
        match self.repository.set_language(room_id, &language).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(room_id = %room_id, "language-change for missing room");
                return;
            }
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "storage failure on language-change");
                self.metrics.event_rejected();
                return;
            }
        }

        self.broadcast(
            room_id,
            ServerMessage::LanguageUpdate {
                language: language.clone(),
                username: identity.username.clone(),
                message: format!("{} changed the language to {}", identity.username, language),
                timestamp: Utc::now().to_rfc3339(),
            },
            None,
        )
        .await;
    }

    async fn handle_chat(&self, identity: &Identity, room_id: RoomId, message: String) {
        self.broadcast(
            room_id,
            ServerMessage::ChatMessage {
                user_id: identity.user_id,
                username: identity.username.clone(),
                message,
                timestamp: Utc::now().to_rfc3339(),
            },
            None,
        )
        .await;
    }

    async fn handle_cursor(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        room_id: RoomId,
        position: CursorPosition,
    ) {
        self.broadcast(
            room_id,
            ServerMessage::CursorUpdate {
                user_id: identity.user_id,
                username: identity.username.clone(),
                position,
            },
            Some(conn),
        )
        .await;
    }

    async fn handle_signal(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        kind: SignalKind,
        target: UserId,
        payload: Value,
    ) {
        match self.relay.relay(kind, identity, target, payload).await {
            Ok(()) => self.metrics.message_sent(),
            Err(RelayError::TargetUnreachable(user_id)) => {
                // ICE candidates arrive in bursts; a vanished peer is routine.
                if kind == SignalKind::IceCandidate {
                    debug!(target = %user_id, "dropping ice-candidate for unreachable user");
                } else {
                    self.send_error(conn, &format!("User {user_id} is not connected"))
                        .await;
                }
            }
        }
    }

    async fn handle_get_users(&self, conn: ConnectionId, room_id: RoomId) {
        match self.repository.get_room(room_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.send_error(conn, "Room not found").await;
                return;
            }
            Err(e) => {
                self.storage_failure(conn, room_id, "get-users", e).await;
                return;
            }
        }

        match self.repository.list_members(room_id).await {
            Ok(users) => self.send_to(conn, ServerMessage::RoomUsers { users }).await,
            Err(e) => self.storage_failure(conn, room_id, "get-users", e).await,
        }
    }

    async fn handle_get_username(&self, conn: ConnectionId, user_id: UserId) {
        match self.repository.get_username(user_id).await {
            Ok(Some(username)) => {
                self.send_to(conn, ServerMessage::UserInfo { user_id, username })
                    .await;
            }
            Ok(None) => {
                debug!(user_id = %user_id, "get-username for unknown user");
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "storage failure on get-username");
                self.metrics.event_rejected();
            }
        }
    }

    /// Events that expect a reply get an explicit error; fire-and-forget
    /// events are dropped without side effects.
    async fn reject_unauthenticated(&self, conn: ConnectionId, message: &ClientMessage) {
        self.metrics.event_rejected();
        match message {
            ClientMessage::Join { .. }
            | ClientMessage::GetUsers { .. }
            | ClientMessage::GetMyUserId => {
                self.send_error(conn, "Not authenticated").await;
            }
            _ => {
                debug!(conn_id = %conn, "dropping event from unauthenticated connection");
            }
        }
    }

    /// Fan a message out to a room's subscribers, optionally excluding the
    /// sender. Vanished targets are skipped, never abort the broadcast.
    async fn broadcast(&self, room_id: RoomId, message: ServerMessage, exclude: Option<ConnectionId>) {
        let subscribers = self.subscriptions.subscribers(room_id).await;
        let targets: Vec<ConnectionId> = subscribers
            .into_iter()
            .filter(|c| Some(*c) != exclude)
            .collect();

        for (conn, sender) in self.registry.senders_for(&targets).await {
            if sender.send(message.clone()).is_err() {
                warn!(conn_id = %conn, room_id = %room_id, "dropping broadcast to closed connection");
                self.metrics.message_dropped();
            } else {
                self.metrics.message_sent();
            }
        }
    }

    async fn send_to(&self, conn: ConnectionId, message: ServerMessage) {
        let Some(sender) = self.registry.sender(conn).await else {
            debug!(conn_id = %conn, "reply target already disconnected");
            return;
        };
        if sender.send(message).is_err() {
            self.metrics.message_dropped();
        } else {
            self.metrics.message_sent();
        }
    }

    async fn send_error(&self, conn: ConnectionId, message: &str) {
        self.send_to(conn, ServerMessage::Error {
            message: message.to_string(),
        })
        .await;
    }

    async fn storage_failure(
        &self,
        conn: ConnectionId,
        room_id: RoomId,
        event: &str,
        error: anyhow::Error,
    ) {
        warn!(room_id = %room_id, event, error = %error, "storage failure handling event");
        self.metrics.event_rejected();
        self.send_error(conn, "Internal error").await;
    }
}
