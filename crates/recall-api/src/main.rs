//! recall-api - HTTP API server for recall

mod handlers;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use recall_core::{EmbeddingBackend, GenerationBackend, UserDetails};
use recall_db::Database;
use recall_graph::GraphDatabase;
use recall_inference::OllamaBackend;
use recall_jobs::{QueuePublisher, SignatureVerifier};

use services::{ChatService, HistoryCache};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful
/// for log correlation across the analyze → queue → graph-consumer chain.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// AUTHENTICATION BOUNDARY
// =============================================================================

/// Authenticated user identity supplied by the surrounding session layer.
///
/// Session issuance is out of scope; the reverse proxy in front of this
/// service resolves the session and forwards the identity via headers.
/// A request without `x-user-id` is unauthenticated.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub details: UserDetails,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let id = header("x-user-id")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Unauthenticated".to_string()))?;

        Ok(AuthUser {
            id,
            details: UserDetails {
                username: header("x-user-name"),
                email: header("x-user-email"),
            },
        })
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
///
/// Inference clients and stores are constructed once at startup and
/// explicitly injected — no module-scope singletons.
#[derive(Clone)]
pub struct AppState {
    /// Relational store (users, problems, snapshots).
    pub db: Database,
    /// Graph store (knowledge nodes/edges, durable chat history).
    pub graph_db: GraphDatabase,
    /// Delivery-signature verifier for the fan-out consumer endpoint.
    pub verifier: SignatureVerifier,
    /// Queue service client for fan-out publication.
    pub publisher: QueuePublisher,
    /// Embedding model client.
    pub embedder: Arc<dyn EmbeddingBackend>,
    /// Generative model client.
    pub generator: Arc<dyn GenerationBackend>,
    /// Redis conversation cache.
    pub chat_cache: HistoryCache,
    /// Chat orchestrator.
    pub chat: ChatService,
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Database(recall_core::Error),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    /// Upstream model rejected the request or produced unusable output.
    BadGateway(String),
    /// Upstream model unavailable after the bounded retry budget.
    Unavailable(String),
    Internal(String),
}

impl From<recall_core::Error> for ApiError {
    fn from(err: recall_core::Error) -> Self {
        use recall_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::UpstreamPermanent(msg) | Error::Inference(msg) => ApiError::BadGateway(msg),
            Error::UpstreamTransient(msg) => ApiError::Unavailable(msg),
            other => ApiError::Database(other),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Database(recall_core::Error::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS`
/// environment variable. Strict whitelisting — never `Any`.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<HeaderValue>().ok()
            }
        })
        .collect()
}

// =============================================================================
// HEALTH
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// MAIN
// =============================================================================

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(parse_allowed_origins())
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/analyze", post(handlers::analyze::analyze))
        .route("/api/jobs/graph", post(handlers::graph_job::apply_graph_job))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/chats", get(handlers::chats::list_chats))
        .route(
            "/api/chats/:chat_id",
            get(handlers::chats::chat_detail).delete(handlers::chats::delete_chat),
        )
        .route("/api/graph", get(handlers::graph::user_graph))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   RUST_LOG    - standard env filter (default: "recall_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "recall_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!(log_format = %log_format, "Logging initialized");

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/recall".to_string());
    let graph_database_url = std::env::var("GRAPH_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/recall_graph".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    // Connect to the relational store
    info!("Connecting to relational store...");
    let db = Database::connect(&database_url).await?;
    info!("Running relational migrations...");
    db.migrate().await?;

    // Connect to the graph store (independent failure domain)
    info!("Connecting to graph store...");
    let graph_db = GraphDatabase::connect(&graph_database_url).await?;
    info!("Running graph migrations...");
    graph_db.migrate().await?;

    // Inference clients: constructed once, injected everywhere
    let backend = Arc::new(OllamaBackend::from_env());
    info!(
        "Inference backend initialized: embed={}, gen={}",
        EmbeddingBackend::model_name(backend.as_ref()),
        GenerationBackend::model_name(backend.as_ref()),
    );
    let embedder: Arc<dyn EmbeddingBackend> = backend.clone();
    let generator: Arc<dyn GenerationBackend> = backend;

    // Conversation cache
    let chat_cache = HistoryCache::from_env().await;

    // Fan-out plumbing
    let verifier = SignatureVerifier::from_env()?;
    let publisher = QueuePublisher::from_env()?;

    let chat = ChatService::new(
        chat_cache.clone(),
        Arc::new(recall_graph::PgChatStore::new(graph_db.pool.clone())),
        Arc::new(recall_graph::PgGraphRepository::new(graph_db.pool.clone())),
        embedder.clone(),
        generator.clone(),
    );

    let state = AppState {
        db,
        graph_db,
        verifier,
        publisher,
        embedder,
        generator,
        chat_cache,
        chat,
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("recall-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Error;

    #[test]
    fn test_error_mapping_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                Error::Unauthorized("sig".into()).into(),
                StatusCode::UNAUTHORIZED,
            ),
            (
                Error::InvalidInput("bad".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::NotFound("chat".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::UpstreamPermanent("quota".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Inference("malformed JSON".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::UpstreamTransient("overloaded".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::Cache("redis".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_default_origin_is_localhost() {
        // Uses the fallback when ALLOWED_ORIGINS is unset in the test env.
        if std::env::var("ALLOWED_ORIGINS").is_err() {
            let origins = parse_allowed_origins();
            assert_eq!(origins, vec![HeaderValue::from_static("http://localhost:3000")]);
        }
    }
}
