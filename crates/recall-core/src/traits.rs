//! Core traits for recall abstractions.
//!
//! These traits define the seams between the HTTP layer and the stores and
//! inference backends, enabling pluggable implementations and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// RELATIONAL STORE
// =============================================================================

/// Idempotent writer for problem/analysis records.
///
/// Implementations must guarantee that concurrent or duplicate submissions
/// of the same (user_id, url, approach_name) triple never create duplicate
/// parent records, and that snapshots are append-only.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Ensure the user row exists, upsert the record by its natural key
    /// (overwriting mutable metadata), and append a snapshot.
    ///
    /// Returns the parent record id.
    async fn upsert_analysis(&self, req: UpsertAnalysisRequest) -> Result<Uuid>;

    /// Fetch a record by its natural key.
    async fn get_by_natural_key(
        &self,
        user_id: &str,
        url: &str,
        approach_name: &str,
    ) -> Result<Option<AnalysisRecord>>;

    /// All snapshots for a record, oldest first.
    async fn snapshots(&self, problem_id: Uuid) -> Result<Vec<AnalysisSnapshot>>;
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// MERGE-based writer and similarity reader for the knowledge graph.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Apply one fan-out job: merge the four nodes by natural key
    /// (refreshing embeddings) and the three relationships, in a single
    /// transaction. Re-applying an identical payload is a no-op beyond
    /// attribute refresh.
    async fn apply_job(&self, payload: &JobPayload, embeddings: &GraphEmbeddings) -> Result<()>;

    /// Top-K similarity hits per entity kind, scoped strictly to nodes
    /// reachable from `user_id` through its SUBMITTED edge chain.
    async fn similar_entities(
        &self,
        user_id: &str,
        query: &Vector,
        per_kind: i64,
    ) -> Result<Vec<ContextHit>>;

    /// The user's full subgraph for the graph view endpoint.
    async fn user_subgraph(&self, user_id: &str) -> Result<GraphData>;
}

/// Durable per-message chat storage backing the conversation cache.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a session owned by `user_id` and persist its first turns.
    async fn create_session(
        &self,
        user_id: &str,
        chat_id: Uuid,
        title: &str,
        turns: &[ChatTurn],
    ) -> Result<()>;

    /// Append turns to an existing session, in order.
    async fn append_messages(&self, chat_id: Uuid, turns: &[ChatTurn]) -> Result<()>;

    /// The last `limit` messages of a session owned by `user_id`,
    /// ordered by timestamp ascending.
    async fn recent_messages(
        &self,
        user_id: &str,
        chat_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatTurn>>;

    /// Session summaries for the sidebar, newest first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSummary>>;

    /// All messages of a session owned by `user_id`, oldest first.
    async fn session_messages(&self, user_id: &str, chat_id: Uuid) -> Result<Vec<ChatMessage>>;

    /// Delete a session and its messages. Returns false when the session
    /// does not exist or is not owned by `user_id`.
    async fn delete_session(&self, user_id: &str, chat_id: Uuid) -> Result<bool>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate with JSON output enforcement.
    async fn generate_json(&self, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
