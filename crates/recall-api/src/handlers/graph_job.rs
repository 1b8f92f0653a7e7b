//! Signed fan-out consumer endpoint: verify, validate, embed, MERGE.

use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use tracing::{error, warn};

use recall_core::{GraphEmbeddings, GraphRepository, JobPayload};
use recall_jobs::{validate_payload, SIGNATURE_HEADER};

use crate::{ApiError, AppState};

/// `POST /api/jobs/graph`
///
/// The signature check runs on the raw body before any parsing or store
/// access; rejection has no side effects. Delivery is at-least-once, so
/// everything past the boundary is idempotent via the graph store's
/// natural-key MERGE semantics. Embedding failure fails the whole job —
/// nodes are never written without embeddings.
pub async fn apply_graph_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing delivery signature".to_string()))?;

    state.verifier.verify(&body, signature).map_err(|e| {
        warn!(
            subsystem = "api",
            component = "graph_consumer",
            op = "verify_signature",
            error = %e,
            "Rejected fan-out delivery"
        );
        ApiError::Unauthorized("invalid delivery signature".to_string())
    })?;

    let payload: JobPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid payload structure: {e}")))?;
    let payload = validate_payload(payload)?;

    let problem = &payload.problem;
    let texts = vec![
        problem.name.clone(),
        problem.approach_name.clone(),
        problem.domain.clone(),
    ];
    let vectors = state.embedder.embed_texts(&texts).await.map_err(|e| {
        error!(
            subsystem = "api",
            component = "graph_consumer",
            op = "embed",
            problem_url = %problem.url,
            error = %e,
            "Embedding failed; job will be redelivered"
        );
        ApiError::Internal(e.to_string())
    })?;

    let [problem_vec, approach, concept]: [_; 3] = vectors.try_into().map_err(|v: Vec<_>| {
        ApiError::Internal(format!(
            "embedding backend returned {} vectors for 3 inputs",
            v.len()
        ))
    })?;

    state
        .graph_db
        .graph
        .apply_job(
            &payload,
            &GraphEmbeddings {
                problem: problem_vec,
                approach,
                concept,
            },
        )
        .await
        .map_err(|e| {
            error!(
                subsystem = "api",
                component = "graph_consumer",
                op = "apply_job",
                problem_url = %payload.problem.url,
                error = %e,
                "Graph write failed; job will be redelivered"
            );
            ApiError::Internal(e.to_string())
        })?;

    Ok(Json(serde_json::json!({ "success": true })))
}
