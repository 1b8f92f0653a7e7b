//! Chat endpoint: one retrieval-augmented conversation turn.

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiError, AppState, AuthUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub chat_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "A non-empty 'message' is required.".to_string(),
        ));
    }

    let outcome = state
        .chat
        .handle_turn(&auth.id, &req.message, req.chat_id)
        .await?;

    Ok(Json(ChatResponse {
        reply: outcome.reply,
        chat_id: outcome.chat_id,
        title: outcome.title,
    }))
}
