//! Redis-based conversation history cache.
//!
//! Holds the last N turns of each chat session under a key namespaced by
//! (user, chat) with a sliding expiration. The durable message store in
//! the graph database remains the source of truth; the cache degrades
//! gracefully (treated as a miss) whenever Redis is unreachable.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_ENABLED`: Set to "false" to disable caching (default: true)
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `CHAT_CACHE_TTL`: Entry TTL in seconds (default: 3600)

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use recall_core::defaults::{CACHE_TTL_SECS, CHAT_HISTORY_LENGTH};
use recall_core::ChatTurn;

/// Build the cache key for one conversation.
///
/// The key MUST incorporate the owning user id — a key derived from the
/// chat id alone would leak history across users that guess chat ids.
pub fn history_key(user_id: &str, chat_id: Uuid) -> String {
    format!("user:{user_id}:chat:{chat_id}:history")
}

/// Conversation cache backed by Redis.
#[derive(Clone)]
pub struct HistoryCache {
    inner: Arc<HistoryCacheInner>,
}

struct HistoryCacheInner {
    /// Redis connection manager (None if disabled or unreachable).
    connection: RwLock<Option<ConnectionManager>>,
    /// Entry TTL in seconds.
    ttl_seconds: u64,
    enabled: bool,
}

impl HistoryCache {
    /// Create a new history cache from environment configuration.
    pub async fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let ttl_seconds: u64 = std::env::var("CHAT_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(CACHE_TTL_SECS);

        let connection = if enabled {
            match redis::Client::open(redis_url.as_str()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!("Conversation cache enabled (TTL: {}s)", ttl_seconds);
                        Some(conn)
                    }
                    Err(e) => {
                        warn!("Failed to connect to Redis, cache disabled: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Invalid Redis URL, cache disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Conversation cache disabled via REDIS_ENABLED=false");
            None
        };

        Self {
            inner: Arc::new(HistoryCacheInner {
                connection: RwLock::new(connection),
                ttl_seconds,
                enabled,
            }),
        }
    }

    /// Create a disabled cache (for testing or when Redis is unavailable).
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(HistoryCacheInner {
                connection: RwLock::new(None),
                ttl_seconds: CACHE_TTL_SECS,
                enabled: false,
            }),
        }
    }

    /// Check if caching is enabled and connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.enabled && self.inner.connection.read().await.is_some()
    }

    /// Get the cached turns for a conversation, oldest first.
    ///
    /// Returns None on miss, on any Redis error, or when disabled — the
    /// caller then falls back to the durable store.
    pub async fn get(&self, user_id: &str, chat_id: Uuid) -> Option<Vec<ChatTurn>> {
        let key = history_key(user_id, chat_id);
        let mut conn_guard = self.inner.connection.write().await;
        let conn = conn_guard.as_mut()?;

        let entries: Vec<String> = match conn
            .lrange(&key, 0, CHAT_HISTORY_LENGTH as isize - 1)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                error!("Redis LRANGE error: {}", e);
                return None;
            }
        };

        if entries.is_empty() {
            debug!("History cache MISS: {}", key);
            return None;
        }

        // Entries that fail to parse are dropped rather than failing the read.
        let turns: Vec<ChatTurn> = entries
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect();

        debug!("History cache HIT: {} ({} turns)", key, turns.len());
        Some(turns)
    }

    /// Push new turns, trim to the last N, and refresh the expiration.
    pub async fn append(&self, user_id: &str, chat_id: Uuid, turns: &[ChatTurn]) -> bool {
        self.push(user_id, chat_id, turns, true).await
    }

    /// Seed the cache from the durable store after a miss.
    pub async fn backfill(&self, user_id: &str, chat_id: Uuid, turns: &[ChatTurn]) -> bool {
        self.push(user_id, chat_id, turns, false).await
    }

    async fn push(&self, user_id: &str, chat_id: Uuid, turns: &[ChatTurn], trim: bool) -> bool {
        if turns.is_empty() {
            return true;
        }

        let key = history_key(user_id, chat_id);
        let serialized: Vec<String> = match turns.iter().map(serde_json::to_string).collect() {
            Ok(s) => s,
            Err(e) => {
                error!("History serialization error: {}", e);
                return false;
            }
        };

        let mut conn_guard = self.inner.connection.write().await;
        let conn = match conn_guard.as_mut() {
            Some(c) => c,
            None => return false,
        };

        let mut pipe = redis::pipe();
        pipe.rpush(&key, serialized);
        if trim {
            pipe.ltrim(&key, -(CHAT_HISTORY_LENGTH as isize), -1);
        }
        pipe.expire(&key, self.inner.ttl_seconds as i64);

        match pipe.query_async::<()>(conn).await {
            Ok(()) => {
                debug!(
                    "History cache PUSH: {} (+{} turns, TTL {}s)",
                    key,
                    turns.len(),
                    self.inner.ttl_seconds
                );
                true
            }
            Err(e) => {
                error!("Redis pipeline error: {}", e);
                false
            }
        }
    }

    /// Remove a conversation's cache entry (used when a chat is deleted).
    pub async fn invalidate(&self, user_id: &str, chat_id: Uuid) -> bool {
        let key = history_key(user_id, chat_id);
        let mut conn_guard = self.inner.connection.write().await;
        let conn = match conn_guard.as_mut() {
            Some(c) => c,
            None => return false,
        };

        match conn.del::<_, ()>(&key).await {
            Ok(_) => {
                debug!("History cache INVALIDATE: {}", key);
                true
            }
            Err(e) => {
                error!("Redis DEL error: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_namespaced_by_user() {
        let chat_id = Uuid::nil();
        let key_a = history_key("user-a", chat_id);
        let key_b = history_key("user-b", chat_id);

        // Same chat id, different users → different keys. A key derived
        // from the chat id alone is a cross-user leakage defect.
        assert_ne!(key_a, key_b);
        assert!(key_a.contains("user-a"));
        assert!(key_b.contains("user-b"));
    }

    #[test]
    fn test_key_layout() {
        let chat_id = Uuid::nil();
        assert_eq!(
            history_key("u-1", chat_id),
            format!("user:u-1:chat:{chat_id}:history")
        );
    }

    #[tokio::test]
    async fn test_disabled_cache_misses_and_rejects_writes() {
        let cache = HistoryCache::disabled();
        let chat_id = Uuid::new_v4();

        assert!(!cache.is_connected().await);
        assert!(cache.get("u-1", chat_id).await.is_none());
        assert!(!cache.append("u-1", chat_id, &[ChatTurn::user("hi")]).await);
        assert!(!cache.invalidate("u-1", chat_id).await);
    }
}
