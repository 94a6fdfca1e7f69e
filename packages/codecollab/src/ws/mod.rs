//! Real-time layer: wire protocol, connection registry, room subscriptions,
//! the event router, and the WebSocket transport glue.

pub mod handler;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod signaling;
pub mod subscriptions;
