//! Default tunables shared across recall crates.
//!
//! Environment variables may override most of these at startup; the
//! constants are the single source of truth for fallback values.

/// Conversation turns kept in the cache and fed to the chat prompt.
pub const CHAT_HISTORY_LENGTH: usize = 20;

/// Sliding expiration for conversation cache entries (seconds).
pub const CACHE_TTL_SECS: u64 = 3600;

/// Fixed backoff schedule for transient upstream failures (milliseconds).
/// The length of this slice is the retry budget.
pub const RETRY_BACKOFF_MS: [u64; 3] = [250, 500, 1000];

/// Similarity candidates fetched per entity kind before ownership capping.
pub const CONTEXT_TOP_K: i64 = 10;

/// Hits each entity kind may contribute to the rendered context block.
pub const CONTEXT_PER_KIND: usize = 5;

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default generation model.
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Default embedding dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Rendered when similarity retrieval finds nothing in the user's subgraph.
pub const NO_CONTEXT_SENTINEL: &str =
    "No specific information found for this user in the knowledge graph.";

/// Title used when the secondary title-generation call fails.
pub const FALLBACK_CHAT_TITLE: &str = "New Chat";
