//! User subgraph view for the knowledge-graph visualization.

use axum::{extract::State, response::IntoResponse, Json};

use recall_core::GraphRepository;

use crate::{ApiError, AppState, AuthUser};

/// `GET /api/graph` — the requesting user's nodes and links.
pub async fn user_graph(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.graph_db.graph.user_subgraph(&auth.id).await?;
    Ok(Json(data))
}
