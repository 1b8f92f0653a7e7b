//! # recall-graph
//!
//! pgvector-backed knowledge graph store for recall.
//!
//! This crate provides:
//! - MERGE-based node/edge upserts keyed by natural keys
//! - User-scoped vector-similarity retrieval for RAG chat
//! - Durable chat session/message storage backing the conversation cache
//!
//! The graph store runs in its own database (`GRAPH_DATABASE_URL`) so it
//! fails independently of the relational store; consistency between the
//! two relies on idempotent merge semantics plus queue redelivery, not on
//! cross-store transactions.

pub mod chats;
pub mod retrieval;
pub mod upsert;

// Re-export core types
pub use recall_core::*;

pub use chats::PgChatStore;
pub use retrieval::{render_context, retrieve_context};
pub use upsert::PgGraphRepository;

/// Combined graph database context.
pub struct GraphDatabase {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Node/edge upsert engine and similarity reader.
    pub graph: PgGraphRepository,
    /// Durable chat storage.
    pub chats: PgChatStore,
}

impl GraphDatabase {
    /// Create a new GraphDatabase instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            graph: PgGraphRepository::new(pool.clone()),
            chats: PgChatStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new GraphDatabase instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(Error::Database)?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations-graph")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}

impl Clone for GraphDatabase {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
