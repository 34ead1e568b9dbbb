//! Chat routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use atelier_core::ChatRoomId;

use crate::error::AppError;
use crate::middleware::RequireActor;
use crate::models::{MessageWithAuthor, RoomWithMessages};
use crate::state::AppState;

/// Body for `POST /chat/{room_id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message text.
    pub content: String,
}

/// Body for `POST /chat/{room_id}/close`.
#[derive(Debug, Deserialize)]
pub struct CloseChatRequest {
    /// Closing summary stored on the room.
    pub summary: String,
}

/// `POST /chat/{room_id}/messages` - append a message to an open room.
pub async fn send_message(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Path(room_id): Path<ChatRoomId>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageWithAuthor>), AppError> {
    let message = state
        .chat()
        .send_message(room_id, actor, &body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /chat/{room_id}/close` - close a room (admin only).
pub async fn close(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Path(room_id): Path<ChatRoomId>,
    Json(body): Json<CloseChatRequest>,
) -> Result<Json<RoomWithMessages>, AppError> {
    let closed = state.chat().close_chat(room_id, actor, &body.summary).await?;
    Ok(Json(closed))
}

/// `GET /chat/{room_id}` - full room snapshot with message history.
pub async fn get_room(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Path(room_id): Path<ChatRoomId>,
) -> Result<Json<RoomWithMessages>, AppError> {
    let room = state.chat().get_room(room_id, actor).await?;
    Ok(Json(room))
}
