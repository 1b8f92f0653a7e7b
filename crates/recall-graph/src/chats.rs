//! Durable chat session/message storage.
//!
//! Messages are immutable once written and ordered by timestamp. The
//! conversation cache reads through this store on miss.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use recall_core::{
    ChatMessage, ChatStore, ChatSummary, ChatTurn, Error, MessageRole, Result,
};

/// PostgreSQL implementation of ChatStore, colocated with the graph store.
pub struct PgChatStore {
    pool: Pool<Postgres>,
}

impl PgChatStore {
    /// Create a new PgChatStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn insert_turns(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        chat_id: Uuid,
        turns: &[ChatTurn],
    ) -> Result<()> {
        // Millisecond offsets keep intra-batch ordering (user turn before
        // assistant turn) stable under timestamp sorting.
        let base = Utc::now();
        for (i, turn) in turns.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chat_message (id, session_id, role, text, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::now_v7())
            .bind(chat_id)
            .bind(turn.role.as_str())
            .bind(&turn.text)
            .bind(base + Duration::milliseconds(i as i64))
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn create_session(
        &self,
        user_id: &str,
        chat_id: Uuid,
        title: &str,
        turns: &[ChatTurn],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO chat_session (id, user_id, title, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(title)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        Self::insert_turns(&mut tx, chat_id, turns).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn append_messages(&self, chat_id: Uuid, turns: &[ChatTurn]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::insert_turns(&mut tx, chat_id, turns).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: &str,
        chat_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatTurn>> {
        // Last `limit` messages, returned oldest-first for prompting.
        let rows = sqlx::query(
            "SELECT role, text FROM (
                 SELECT m.role, m.text, m.created_at
                 FROM chat_message m
                 JOIN chat_session cs ON cs.id = m.session_id
                 WHERE cs.user_id = $1 AND cs.id = $2
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT $3
             ) sub ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ChatTurn {
                role: MessageRole::from_str_lossy(row.get("role")),
                text: row.get("text"),
            })
            .collect())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSummary>> {
        let rows = sqlx::query(
            "SELECT id, title, created_at
             FROM chat_session
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ChatSummary {
                id: row.get("id"),
                title: row.get("title"),
                updated_at: row.get("created_at"),
            })
            .collect())
    }

    async fn session_messages(&self, user_id: &str, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT m.id, m.session_id, m.role, m.text, m.created_at
             FROM chat_message m
             JOIN chat_session cs ON cs.id = m.session_id
             WHERE cs.user_id = $1 AND cs.id = $2
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ChatMessage {
                id: row.get("id"),
                session_id: row.get("session_id"),
                role: MessageRole::from_str_lossy(row.get("role")),
                text: row.get("text"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn delete_session(&self, user_id: &str, chat_id: Uuid) -> Result<bool> {
        // ON DELETE CASCADE removes the session's messages.
        let result = sqlx::query("DELETE FROM chat_session WHERE id = $1 AND user_id = $2")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
