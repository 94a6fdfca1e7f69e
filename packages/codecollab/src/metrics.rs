//! Server metrics for observability
//!
//! Atomic counters tracking connection and message volume, exposed as JSON
//! via the `/metrics` endpoint.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Currently active WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    /// WebSocket messages received from clients
    pub messages_received: AtomicU64,
    /// WebSocket messages sent to clients
    pub messages_sent: AtomicU64,
    /// Outbound messages dropped because the target connection vanished
    pub messages_dropped: AtomicU64,

    /// Inbound events rejected (unauthenticated, malformed, unknown room)
    pub events_rejected: AtomicU64,
    /// WebSocket transport errors
    pub websocket_errors: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Snapshot all counters for serialization.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            websocket_errors: self.websocket_errors.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub total_connections: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub events_rejected: u64,
    pub websocket_errors: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_counters() {
        let m = ServerMetrics::new();
        m.connection_opened();
        m.connection_opened();
        m.connection_closed();

        let snap = m.snapshot();
        assert_eq!(snap.active_connections, 1);
        assert_eq!(snap.total_connections, 2);
    }

    #[test]
    fn message_counters() {
        let m = ServerMetrics::new();
        m.message_received();
        m.message_sent();
        m.message_sent();
        m.message_dropped();
        m.event_rejected();

        let snap = m.snapshot();
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.messages_dropped, 1);
        assert_eq!(snap.events_rejected, 1);
    }

    #[test]
    fn snapshot_serializes() {
        let m = ServerMetrics::new();
        m.connection_opened();
        let json = serde_json::to_string(&m.snapshot()).unwrap();
        assert!(json.contains("\"active_connections\":1"));
    }
}
