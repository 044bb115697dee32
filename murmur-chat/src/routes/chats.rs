use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};
use murmur_shared::types::api::ApiResponse;
use murmur_shared::types::identity::Caller;

use super::{blocking, validated};
use crate::models::Chat;
use crate::services::{ChatDetail, ChatSummary, CreateChat};
use crate::store::Store;
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 256, message = "between 1 and 256 participants"))]
    pub participants: Vec<Uuid>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameChatRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
    pub up_to: Option<Uuid>,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub chat_id: Uuid,
    pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub total_unread: i64,
}

// --- Handlers ---

/// GET /chats - chats the caller is still in, with last message and unread count
pub async fn list_chats<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<ApiResponse<Vec<ChatSummary>>>> {
    let chats = blocking(&state, move |chats| chats.list_chats_for_user(caller.id)).await?;
    Ok(Json(ApiResponse::ok(chats)))
}

/// POST /chats - create a group (or explicit private) chat; the caller is always a participant
pub async fn create_chat<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateChatRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Chat>>)> {
    validated(&req)?;

    let mut participant_ids = req.participants;
    if !participant_ids.contains(&caller.id) {
        participant_ids.insert(0, caller.id);
    }

    let new_chat = CreateChat {
        creator_id: caller.id,
        name: req.name,
        participant_ids,
        is_private: req.is_private,
    };
    let chat = blocking(&state, move |chats| chats.create_chat(new_chat)).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(chat))))
}

/// GET /chats/:id
pub async fn get_chat<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ChatDetail>>> {
    let detail = blocking(&state, move |chats| chats.get_chat_detail(chat_id, caller.id)).await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// PATCH /chats/:id - rename a group chat
pub async fn rename_chat<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<RenameChatRequest>,
) -> AppResult<Json<ApiResponse<Chat>>> {
    validated(&req)?;
    let chat = blocking(&state, move |chats| chats.rename_chat(chat_id, caller.id, req.name)).await?;
    Ok(Json(ApiResponse::ok(chat)))
}

/// DELETE /chats/:id - leave the chat
pub async fn leave_chat<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let removed = blocking(&state, move |chats| chats.remove_participant(chat_id, caller.id)).await?;
    if removed == 0 {
        return Err(AppError::new(
            ErrorCode::MembershipNotFound,
            "not a member of this chat or already left",
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /chats/:id/read - mark the caller's messages read, optionally up to one message
pub async fn mark_read<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
    Path(chat_id): Path<Uuid>,
    body: Option<Json<MarkReadRequest>>,
) -> AppResult<Json<ApiResponse<MarkReadResponse>>> {
    let Json(req) = body.unwrap_or_default();
    let marked = blocking(&state, move |chats| chats.mark_read(chat_id, caller.id, req.up_to)).await?;
    Ok(Json(ApiResponse::ok(MarkReadResponse { chat_id, marked })))
}

/// GET /unread-count - unread messages across all of the caller's chats
pub async fn unread_count<S: Store>(
    caller: Caller,
    State(state): State<Arc<AppState<S>>>,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let total_unread = blocking(&state, move |chats| chats.total_unread(caller.id)).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { total_unread })))
}
