//! Analyze endpoint: generative analysis of a solved-problem submission,
//! idempotent relational write, then fan-out publication.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use tracing::info;

use recall_core::{AnalysisRepository, UpsertAnalysisRequest};
use recall_inference::generate_analysis;
use recall_jobs::QueuePublisher;

use crate::{ApiError, AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub link: String,
    pub code: String,
    pub notes: Option<String>,
}

/// `POST /api/analyze`
///
/// Order matters: the relational write must commit before the fan-out job
/// is published, and a write failure must not publish anything. Publish
/// failures, in turn, never fail the request — the relational record is
/// already durable.
pub async fn analyze(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.link.trim().is_empty() || req.code.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Both link and code are required.".to_string(),
        ));
    }

    let outcome = generate_analysis(state.generator.as_ref(), &req.link, &req.code).await?;

    let domain = outcome.domain().unwrap_or_default().to_string();
    let key_algorithm = outcome.key_algorithm().unwrap_or_default().to_string();

    state
        .db
        .analyses
        .upsert_analysis(UpsertAnalysisRequest {
            user_id: auth.id.clone(),
            user_details: auth.details.clone(),
            url: req.link.clone(),
            outcome: outcome.clone(),
            notes: req.notes.clone(),
        })
        .await?;

    info!(
        subsystem = "api",
        component = "analyze",
        op = "upsert",
        user_id = %auth.id,
        problem_url = %req.link,
        "Analysis stored"
    );

    // Fire-and-forget fan-out; failure is logged by the publisher under
    // its own component and never rolls back the relational write.
    let payload = QueuePublisher::payload_for(&auth.id, &req.link, &outcome);
    let publisher = state.publisher.clone();
    tokio::spawn(async move {
        publisher.publish_logged(&payload).await;
    });

    let mut body = serde_json::to_value(&outcome)?;
    body["domain"] = serde_json::Value::String(domain);
    body["keyAlgorithm"] = serde_json::Value::String(key_algorithm);
    Ok(Json(body))
}
