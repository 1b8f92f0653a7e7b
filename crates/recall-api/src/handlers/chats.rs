//! Chat session listing, detail, and deletion.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use recall_core::{ChatStore, MessageRole};

use crate::{ApiError, AppState, AuthUser};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatListEntry {
    id: Uuid,
    title: String,
    updated_at: i64,
}

/// `GET /api/chats` — session summaries for the sidebar, newest first.
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.graph_db.chats.list_sessions(&auth.id).await?;

    let entries: Vec<ChatListEntry> = sessions
        .into_iter()
        .map(|s| ChatListEntry {
            id: s.id,
            title: s.title,
            updated_at: s.updated_at.timestamp_millis(),
        })
        .collect();

    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatMessageEntry {
    id: Uuid,
    /// Rendered as "user" or "bot" — the shape the chat UI consumes.
    role: &'static str,
    text: String,
    created_at: i64,
}

/// `GET /api/chats/:chat_id` — ordered messages of one owned session.
pub async fn chat_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .graph_db
        .chats
        .session_messages(&auth.id, chat_id)
        .await?;

    let entries: Vec<ChatMessageEntry> = messages
        .into_iter()
        .map(|m| ChatMessageEntry {
            id: m.id,
            role: match m.role {
                MessageRole::Assistant => "bot",
                MessageRole::User => "user",
            },
            text: m.text,
            created_at: m.created_at.timestamp_millis(),
        })
        .collect();

    Ok(Json(serde_json::json!({ "messages": entries })))
}

/// `DELETE /api/chats/:chat_id` — remove the session, its messages, and
/// its conversation cache entry.
pub async fn delete_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .graph_db
        .chats
        .delete_session(&auth.id, chat_id)
        .await?;

    if !deleted {
        return Err(ApiError::NotFound(
            "Chat not found or you don't have permission to delete it.".to_string(),
        ));
    }

    state.chat_cache.invalidate(&auth.id, chat_id).await;

    Ok(Json(
        serde_json::json!({ "message": "Chat deleted successfully." }),
    ))
}
