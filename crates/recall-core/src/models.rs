//! Core data models for recall.
//!
//! Wire types (analysis outcomes, fan-out payloads, chat turns) and row
//! types for the relational and graph stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pgvector::Vector;

// =============================================================================
// ANALYSIS
// =============================================================================

/// Problem difficulty as reported by the analysis model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// Parse the database string form. Unknown values map to Medium.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "Easy" => Difficulty::Easy,
            "Hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

/// Structured analysis produced by the generative model for one submission.
///
/// `tags` is the ordered pair `[domain, key_algorithm]` — e.g.
/// `["Graph", "Dijkstra"]`. Validation of that shape happens in
/// `recall-inference` before the outcome reaches any store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Human-readable problem title (e.g. "Two Sum").
    pub name: String,
    /// Short name for this specific solution (e.g. "Hash Map O(n)").
    pub approach_name: String,
    /// 3-10 ultra-concise pseudocode lines, first line is the signature.
    pub pseudo_code: Vec<String>,
    /// Single Big-O term for time complexity.
    pub time: String,
    /// Single Big-O term for space complexity.
    pub space: String,
    /// Ordered pair `[domain, key_algorithm]`.
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
}

impl AnalysisOutcome {
    /// The broad topic (first tag), if present.
    pub fn domain(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// The key algorithm (second tag), if present.
    pub fn key_algorithm(&self) -> Option<&str> {
        self.tags.get(1).map(String::as_str)
    }
}

/// Profile fields supplied by the session layer for create-if-absent users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDetails {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Request for the idempotent relational writer.
#[derive(Debug, Clone)]
pub struct UpsertAnalysisRequest {
    pub user_id: String,
    pub user_details: UserDetails,
    pub url: String,
    pub outcome: AnalysisOutcome,
    pub notes: Option<String>,
}

/// One problem/approach record, unique per (user_id, url, approach_name).
///
/// Mutable metadata is overwritten on resubmission; snapshots are only
/// ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: String,
    pub url: String,
    pub approach_name: String,
    pub name: String,
    pub domain: String,
    pub key_algorithm: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only analysis snapshot attached to an [`AnalysisRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub id: Uuid,
    pub problem_id: Uuid,
    pub pseudo_code: Vec<String>,
    pub time_complexity: String,
    pub space_complexity: String,
    pub tags: Vec<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// FAN-OUT JOB PAYLOAD
// =============================================================================

/// Normalized problem descriptor carried by a fan-out job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDescriptor {
    pub url: String,
    pub name: String,
    /// The broad topic, e.g. "Array".
    pub domain: String,
    /// The specific technique, e.g. "Two Pointers".
    pub approach_name: String,
}

/// Minimal projection handed to the graph upsert consumer.
///
/// Normalization (trimming, humanizing machine-cased identifiers) happens
/// once in the publisher; the consumer never re-derives naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub user_id: String,
    pub problem: ProblemDescriptor,
}

// =============================================================================
// GRAPH ENTITIES
// =============================================================================

/// Kind of a knowledge-graph entity returned by similarity retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Problem,
    Approach,
    Concept,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Problem => write!(f, "Problem"),
            EntityKind::Approach => write!(f, "Approach"),
            EntityKind::Concept => write!(f, "Concept"),
        }
    }
}

/// One similarity hit inside the requesting user's subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextHit {
    pub kind: EntityKind,
    pub name: String,
    pub score: f32,
}

/// Embeddings computed for one fan-out job, in node order.
#[derive(Debug, Clone)]
pub struct GraphEmbeddings {
    pub problem: Vector,
    pub approach: Vector,
    pub concept: Vector,
}

/// A node in the user-subgraph view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A directed edge in the user-subgraph view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// The complete subgraph returned by the graph view endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

// =============================================================================
// CHAT
// =============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// One conversation turn as cached and prompted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }
}

/// Durable chat session row. Owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Durable chat message row. Immutable once written; ordered by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Session summary for the chat sidebar listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}
