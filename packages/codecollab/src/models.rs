//! Core domain types shared across the repository, router, and wire protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable user identifier (SQLite rowid of the users table).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed room identifier. Stringification is a wire-format concern only —
/// internally a room is always addressed by this id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verified identity bound to a connection at admission time.
/// Immutable for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

/// A user row.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: i64,
}

/// A room row: persistent collaborative session state.
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub owner_id: UserId,
    pub language: String,
    pub code: String,
    pub video_enabled: bool,
    pub created_at: i64,
}

/// Member summary as it appears in room user lists on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: UserId,
    pub username: String,
}
