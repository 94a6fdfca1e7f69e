//! HTTP surface: health/metrics, room CRUD, and the WebSocket upgrade.

pub mod health;
pub mod rooms;
pub mod websocket;
