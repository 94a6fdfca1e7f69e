//! WebSocket admission: verify the token, then upgrade.
//!
//! The token rides the connect URL (`GET /ws?token=...`) because browsers
//! cannot set headers on WebSocket upgrades. Verification failure rejects
//! with 401 before any socket exists; an admitted socket always carries a
//! resolved identity.

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;
use crate::auth::AuthError;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, AuthError> {
    let identity = state.resolver.verify(&query.token).await.inspect_err(|e| {
        debug!("Rejecting WebSocket admission: {}", e);
    })?;

    let router = state.router.clone();
    let metrics = state.metrics.clone();
    Ok(ws.on_upgrade(move |socket| {
        crate::ws::handler::handle_socket(socket, identity, router, metrics)
    }))
}
