use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};
use murmur_shared::types::api::ApiResponse;
use murmur_shared::types::identity::Caller;
use murmur_shared::types::pagination::{Paginated, PaginationParams};

use super::{blocking, validated};
use crate::models::Message;
use crate::services::MessageTarget;
use crate::store::Store;
use crate::AppState;

// --- Request DTOs ---

/// Exactly one of `chat_id` (existing chat) or `dest_id` (new private chat) must be set.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub chat_id: Option<Uuid>,
    pub dest_id: Option<Uuid>,
    #[validate(length(min = 1, max = 4096, message = "text must be 1-4096 characters"))]
    pub text: String,
}

impl SendMessageRequest {
    fn target(&self) -> AppResult<MessageTarget> {
        match (self.chat_id, self.dest_id) {
            (Some(chat_id), None) => Ok(MessageTarget::Chat(chat_id)),
            (None, Some(dest_id)) => Ok(MessageTarget::Direct(dest_id)),
            _ => Err(AppError::new(
                ErrorCode::ValidationError,
                "exactly one of chat_id or dest_id is required",
            )),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 4096, message = "text must be 1-4096 characters"))]
    pub text: String,
}

// --- Handlers ---

/// GET /chats/:id/messages - oldest first
pub async fn list_messages<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(chat_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Message>>>> {
    let page = blocking(&state, move |chats| chats.list_chat_messages(chat_id, caller.id, &params)).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /messages - send into a chat, or open a private chat with `dest_id`
pub async fn send_message<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Message>>)> {
    validated(&req)?;
    let target = req.target()?;

    let message = blocking(&state, move |chats| chats.send_message(caller.id, target, &req.text)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message))))
}

/// PATCH /messages/:id
pub async fn edit_message<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<EditMessageRequest>,
) -> AppResult<Json<ApiResponse<Message>>> {
    validated(&req)?;
    let message = blocking(&state, move |chats| chats.edit_message(message_id, caller.id, &req.text)).await?;
    Ok(Json(ApiResponse::ok(message)))
}

/// DELETE /messages/:id - soft delete, author only
pub async fn delete_message<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(message_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let deleted = blocking(&state, move |chats| chats.delete_message(message_id, caller.id)).await?;
    if deleted == 0 {
        return Err(AppError::new(ErrorCode::MessageNotFound, "message not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
