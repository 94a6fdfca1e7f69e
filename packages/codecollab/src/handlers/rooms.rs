//! Room CRUD routes. Thin layer over the same repository the event router
//! uses; everything requires a bearer token.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::AppState;
use crate::auth::AuthUser;
use crate::models::RoomId;

fn internal_error(context: &str, error: anyhow::Error) -> Response {
    error!("{}: {:#}", context, error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub member_only: bool,
}

pub async fn list_rooms(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<ListRoomsQuery>,
) -> Response {
    let result = if query.member_only {
        state.repository.list_member_rooms(identity.user_id).await
    } else {
        state.repository.list_rooms().await
    };

    match result {
        Ok(rooms) => Json(json!({ "rooms": rooms })).into_response(),
        Err(e) => internal_error("Failed to list rooms", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub language: Option<String>,
}

pub async fn create_room(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(request): Json<CreateRoomRequest>,
) -> Response {
    if request.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Room name is required" })),
        )
            .into_response();
    }

    match state.repository.room_name_exists(&request.name).await {
        Ok(true) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Room name already exists" })),
            )
                .into_response();
        }
        Ok(false) => {}
        Err(e) => return internal_error("Failed to check room name", e),
    }

    match state
        .repository
        .create_room(&request.name, identity.user_id, request.language.as_deref())
        .await
    {
        Ok(room) => (StatusCode::CREATED, Json(json!({ "room": room }))).into_response(),
        Err(e) => internal_error("Failed to create room", e),
    }
}

pub async fn get_room(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_id): Path<i64>,
) -> Response {
    let room_id = RoomId(room_id);

    let room = match state.repository.get_room(room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => return room_not_found(),
        Err(e) => return internal_error("Failed to load room", e),
    };

    let members = match state.repository.list_members(room_id).await {
        Ok(members) => members,
        Err(e) => return internal_error("Failed to load room members", e),
    };

    let is_member = members.iter().any(|m| m.id == identity.user_id);

    Json(json!({
        "room": room,
        "members": members,
        "is_member": is_member,
    }))
    .into_response()
}

pub async fn join_room(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_id): Path<i64>,
) -> Response {
    let room_id = RoomId(room_id);

    match state.repository.get_room(room_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return room_not_found(),
        Err(e) => return internal_error("Failed to load room", e),
    }

    match state.repository.is_member(room_id, identity.user_id).await {
        Ok(true) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Already a member of this room" })),
            )
                .into_response();
        }
        Ok(false) => {}
        Err(e) => return internal_error("Failed to check membership", e),
    }

    match state.repository.ensure_member(room_id, identity.user_id).await {
        Ok(()) => Json(json!({ "message": "Joined room successfully" })).into_response(),
        Err(e) => internal_error("Failed to join room", e),
    }
}

pub async fn leave_room(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_id): Path<i64>,
) -> Response {
    let room_id = RoomId(room_id);

    match state.repository.remove_member(room_id, identity.user_id).await {
        Ok(true) => Json(json!({ "message": "Left room successfully" })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Not a member of this room" })),
        )
            .into_response(),
        Err(e) => internal_error("Failed to leave room", e),
    }
}

/// Flip the room's video flag. Owner only.
pub async fn toggle_video(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_id): Path<i64>,
) -> Response {
    let room_id = RoomId(room_id);

    let room = match state.repository.get_room(room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => return room_not_found(),
        Err(e) => return internal_error("Failed to load room", e),
    };

    if room.owner_id != identity.user_id {
        return forbidden();
    }

    let enabled = !room.video_enabled;
    match state.repository.set_video_enabled(room_id, enabled).await {
        Ok(true) => Json(json!({
            "message": if enabled { "Video chat enabled" } else { "Video chat disabled" },
            "room": { "id": room.id, "name": room.name, "video_enabled": enabled },
        }))
        .into_response(),
        Ok(false) => room_not_found(),
        Err(e) => internal_error("Failed to toggle video", e),
    }
}

pub async fn delete_room(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_id): Path<i64>,
) -> Response {
    let room_id = RoomId(room_id);

    let room = match state.repository.get_room(room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => return room_not_found(),
        Err(e) => return internal_error("Failed to load room", e),
    };

    if room.owner_id != identity.user_id {
        return forbidden();
    }

    match state.repository.delete_room(room_id).await {
        Ok(true) => Json(json!({ "message": "Room deleted successfully" })).into_response(),
        Ok(false) => room_not_found(),
        Err(e) => internal_error("Failed to delete room", e),
    }
}

fn room_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Room not found" })),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
