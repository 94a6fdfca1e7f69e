//! Wire protocol for the collaborative room WebSocket.
//!
//! Closed sum types on both directions: event names are kebab-case in the
//! `type` tag, payload fields are camelCase. Anything that does not parse into
//! `ClientMessage` is answered with an `error` event at the transport layer
//! and never reaches the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{RoomId, RoomUser, UserId};

/// Cursor location inside the shared buffer. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

/// Events a client may send. Signaling payloads (offer/answer/candidate) are
/// opaque JSON relayed verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        room_id: RoomId,
    },
    Leave {
        room_id: RoomId,
    },
    CodeChange {
        room_id: RoomId,
        code: String,
    },
    LanguageChange {
        room_id: RoomId,
        language: String,
    },
    ChatMessage {
        room_id: RoomId,
        message: String,
    },
    CursorPosition {
        room_id: RoomId,
        position: CursorPosition,
    },
    VideoOffer {
        room_id: RoomId,
        target_user_id: UserId,
        offer: Value,
    },
    VideoAnswer {
        room_id: RoomId,
        target_user_id: UserId,
        answer: Value,
    },
    IceCandidate {
        room_id: RoomId,
        target_user_id: UserId,
        candidate: Value,
    },
    GetMyUserId,
    GetUsers {
        room_id: RoomId,
    },
    GetUsername {
        user_id: UserId,
    },
}

/// Events the server emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    UserJoined {
        user: RoomUser,
        message: String,
        timestamp: String,
    },
    SyncCode {
        code: String,
        language: String,
        users: Vec<RoomUser>,
    },
    UserLeft {
        user_id: UserId,
        username: String,
        message: String,
        timestamp: String,
    },
    CodeUpdate {
        code: String,
        user_id: UserId,
    },
    LanguageUpdate {
        language: String,
        username: String,
        message: String,
        timestamp: String,
    },
    ChatMessage {
        user_id: UserId,
        username: String,
        message: String,
        timestamp: String,
    },
    CursorUpdate {
        user_id: UserId,
        username: String,
        position: CursorPosition,
    },
    VideoOffer {
        user_id: UserId,
        username: String,
        offer: Value,
    },
    VideoAnswer {
        user_id: UserId,
        username: String,
        answer: Value,
    },
    IceCandidate {
        user_id: UserId,
        candidate: Value,
    },
    YourUserId {
        user_id: UserId,
    },
    RoomUsers {
        users: Vec<RoomUser>,
    },
    UserInfo {
        user_id: UserId,
        username: String,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_join_parses() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "join", "roomId": 10})).unwrap();
        assert_eq!(msg, ClientMessage::Join { room_id: RoomId(10) });
    }

    #[test]
    fn client_code_change_parses() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "code-change", "roomId": 10, "code": "x=1"}))
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::CodeChange {
                room_id: RoomId(10),
                code: "x=1".to_string(),
            }
        );
    }

    #[test]
    fn client_signaling_fields_are_camel_case() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "video-offer",
            "roomId": 3,
            "targetUserId": 7,
            "offer": {"sdp": "v=0"},
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::VideoOffer {
                room_id: RoomId(3),
                target_user_id: UserId(7),
                offer: json!({"sdp": "v=0"}),
            }
        );
    }

    #[test]
    fn client_get_my_user_id_has_no_payload() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "get-my-user-id"})).unwrap();
        assert_eq!(msg, ClientMessage::GetMyUserId);
    }

    #[test]
    fn unknown_event_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({"type": "shutdown-server"}));
        assert!(result.is_err());
    }

    #[test]
    fn missing_field_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({"type": "code-change", "roomId": 10}));
        assert!(result.is_err());
    }

    #[test]
    fn server_code_update_shape() {
        let value = serde_json::to_value(ServerMessage::CodeUpdate {
            code: "x=1".to_string(),
            user_id: UserId(1),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "code-update", "code": "x=1", "userId": 1}));
    }

    #[test]
    fn server_sync_code_shape() {
        let value = serde_json::to_value(ServerMessage::SyncCode {
            code: "x=1".to_string(),
            language: "python".to_string(),
            users: vec![RoomUser {
                id: UserId(1),
                username: "alice".to_string(),
            }],
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "sync-code",
                "code": "x=1",
                "language": "python",
                "users": [{"id": 1, "username": "alice"}],
            })
        );
    }

    #[test]
    fn server_your_user_id_shape() {
        let value = serde_json::to_value(ServerMessage::YourUserId { user_id: UserId(5) }).unwrap();
        assert_eq!(value, json!({"type": "your-user-id", "userId": 5}));
    }

    #[test]
    fn server_error_shape() {
        let value = serde_json::to_value(ServerMessage::Error {
            message: "Room not found".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "error", "message": "Room not found"}));
    }
}
