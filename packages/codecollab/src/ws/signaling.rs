//! WebRTC signaling relay: unicast offer/answer/ICE forwarding by user id.
//!
//! Payloads are opaque JSON relayed verbatim with the sender's identity
//! attached. Nothing here is persisted.

use std::sync::Arc;

use serde_json::Value;

use crate::models::{Identity, UserId};
use crate::ws::protocol::ServerMessage;
use crate::ws::registry::ConnectionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("user {0} has no live connection")]
    TargetUnreachable(UserId),
}

pub struct SignalingRelay {
    registry: Arc<ConnectionRegistry>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Forward a signaling payload to the target user's most recent
    /// connection. The target vanishing between lookup and send counts as
    /// unreachable too.
    pub async fn relay(
        &self,
        kind: SignalKind,
        sender: &Identity,
        target: UserId,
        payload: Value,
    ) -> Result<(), RelayError> {
        let (_, tx) = self
            .registry
            .find_user_connection(target)
            .await
            .ok_or(RelayError::TargetUnreachable(target))?;

        let message = match kind {
            SignalKind::Offer => ServerMessage::VideoOffer {
                user_id: sender.user_id,
                username: sender.username.clone(),
                offer: payload,
            },
            SignalKind::Answer => ServerMessage::VideoAnswer {
                user_id: sender.user_id,
                username: sender.username.clone(),
                answer: payload,
            },
            SignalKind::IceCandidate => ServerMessage::IceCandidate {
                user_id: sender.user_id,
                candidate: payload,
            },
        };

        tx.send(message)
            .map_err(|_| RelayError::TargetUnreachable(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::registry::ConnectionId;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn identity(id: i64, name: &str) -> Identity {
        Identity {
            user_id: UserId(id),
            username: name.to_string(),
        }
    }

    #[tokio::test]
    async fn offer_reaches_target_with_sender_attached() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = SignalingRelay::new(registry.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .register(ConnectionId::new(), identity(2, "bob"), tx)
            .await;

        relay
            .relay(
                SignalKind::Offer,
                &identity(1, "alice"),
                UserId(2),
                json!({"sdp": "v=0"}),
            )
            .await
            .unwrap();

        let msg = rx.try_recv().unwrap();
        assert_eq!(
            msg,
            ServerMessage::VideoOffer {
                user_id: UserId(1),
                username: "alice".to_string(),
                offer: json!({"sdp": "v=0"}),
            }
        );
    }

    #[tokio::test]
    async fn ice_candidate_omits_username() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = SignalingRelay::new(registry.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .register(ConnectionId::new(), identity(2, "bob"), tx)
            .await;

        relay
            .relay(
                SignalKind::IceCandidate,
                &identity(1, "alice"),
                UserId(2),
                json!({"candidate": "c"}),
            )
            .await
            .unwrap();

        let msg = rx.try_recv().unwrap();
        assert_eq!(
            msg,
            ServerMessage::IceCandidate {
                user_id: UserId(1),
                candidate: json!({"candidate": "c"}),
            }
        );
    }

    #[tokio::test]
    async fn missing_target_is_unreachable() {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = SignalingRelay::new(registry);

        let err = relay
            .relay(SignalKind::Answer, &identity(1, "alice"), UserId(9), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TargetUnreachable(UserId(9))));
    }
}
