//! Chat orchestrator: retrieval-augmented generation over the user's
//! knowledge graph with cached conversation history.
//!
//! Each turn is a small state machine. A request without a chat id starts
//! a new session (fresh id, no history read); an existing session reads
//! cached history concurrently with context retrieval. Both paths converge
//! on one generation call, after which the new turns are persisted to the
//! cache and the durable store in the background — the reply is returned
//! before durable persistence is guaranteed to complete. That race is
//! accepted behavior: a crash in the window loses the turn from durable
//! history but not from the immediate response.

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use recall_core::defaults::{CHAT_HISTORY_LENGTH, FALLBACK_CHAT_TITLE};
use recall_core::{
    ChatStore, ChatTurn, EmbeddingBackend, GenerationBackend, GraphRepository, MessageRole, Result,
};
use recall_graph::retrieval::retrieve_context;

use super::history_cache::HistoryCache;

/// System framing for the RAG chat prompt.
const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant for a computer science student. \
    Your knowledge is augmented by information retrieved from the user's personal knowledge \
    graph of solved problems. Use this context to answer their question accurately. If the \
    context doesn't contain the answer, state that you couldn't find relevant information \
    from their history.";

/// Result of one orchestrated chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurnOutcome {
    pub reply: String,
    pub chat_id: Uuid,
    /// Present only for new sessions.
    pub title: Option<String>,
}

/// Build the augmented prompt: retrieved context, then the conversation so
/// far, then the current question.
pub fn build_chat_prompt(context: &str, history: &[ChatTurn], message: &str) -> String {
    let mut prompt = format!("CONTEXT FROM USER'S HISTORY:\n---\n{context}\n---\n");

    if !history.is_empty() {
        prompt.push_str("\nCONVERSATION SO FAR:\n");
        for turn in history {
            let speaker = match turn.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", turn.text));
        }
    }

    prompt.push_str(&format!("\nUSER'S CURRENT QUESTION:\n{message}"));
    prompt
}

/// Orchestrates cache, retrieval, generation, and persistence for chat.
#[derive(Clone)]
pub struct ChatService {
    cache: HistoryCache,
    store: Arc<dyn ChatStore>,
    graph: Arc<dyn GraphRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    generator: Arc<dyn GenerationBackend>,
}

impl ChatService {
    pub fn new(
        cache: HistoryCache,
        store: Arc<dyn ChatStore>,
        graph: Arc<dyn GraphRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            cache,
            store,
            graph,
            embedder,
            generator,
        }
    }

    /// Handle one chat turn for `user_id`.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        message: &str,
        existing_chat_id: Option<Uuid>,
    ) -> Result<ChatTurnOutcome> {
        let is_new = existing_chat_id.is_none();
        let chat_id = existing_chat_id.unwrap_or_else(Uuid::new_v4);

        // History read and context retrieval are independent; overlap them.
        let (history, context) = tokio::join!(
            self.history(user_id, chat_id, is_new),
            retrieve_context(self.embedder.as_ref(), self.graph.as_ref(), user_id, message),
        );
        let context = context?;

        let prompt = build_chat_prompt(&context, &history, message);
        let reply = self
            .generator
            .generate_with_system(CHAT_SYSTEM_PROMPT, &prompt)
            .await?;

        let title = if is_new {
            Some(self.generate_title(message).await)
        } else {
            None
        };

        // Best-effort background persistence; the reply does not wait for it.
        let service = self.clone();
        let owner = user_id.to_string();
        let turns = vec![ChatTurn::user(message), ChatTurn::assistant(&reply)];
        let session_title = title.clone();
        tokio::spawn(async move {
            service
                .persist_turn(&owner, chat_id, is_new, session_title, &turns)
                .await;
        });

        Ok(ChatTurnOutcome {
            reply,
            chat_id,
            title,
        })
    }

    /// Cached history for an existing session, falling back to the durable
    /// store (and backfilling the cache) on miss. History failures degrade
    /// to an empty transcript rather than failing the turn.
    async fn history(&self, user_id: &str, chat_id: Uuid, is_new: bool) -> Vec<ChatTurn> {
        if is_new {
            return Vec::new();
        }

        if let Some(cached) = self.cache.get(user_id, chat_id).await {
            return cached;
        }

        match self
            .store
            .recent_messages(user_id, chat_id, CHAT_HISTORY_LENGTH as i64)
            .await
        {
            Ok(turns) => {
                if !turns.is_empty() {
                    self.cache.backfill(user_id, chat_id, &turns).await;
                }
                turns
            }
            Err(e) => {
                warn!(
                    subsystem = "api",
                    component = "chat_orchestrator",
                    op = "history",
                    user_id = %user_id,
                    chat_id = %chat_id,
                    error = %e,
                    "History retrieval failed; continuing without history"
                );
                Vec::new()
            }
        }
    }

    /// Derive a short session title via a secondary generative call.
    async fn generate_title(&self, message: &str) -> String {
        let prompt = format!(
            "Generate a concise, 5-word title for the following user query. \
             Respond with only the title and nothing else: \"{message}\""
        );
        match self.generator.generate(&prompt).await {
            Ok(title) => {
                let cleaned = title.trim().replace('"', "");
                if cleaned.is_empty() {
                    FALLBACK_CHAT_TITLE.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!(
                    subsystem = "api",
                    component = "chat_orchestrator",
                    op = "generate_title",
                    error = %e,
                    "Title generation failed, using fallback"
                );
                FALLBACK_CHAT_TITLE.to_string()
            }
        }
    }

    /// Persist one turn to the cache and the durable store.
    ///
    /// Runs after the reply has been sent; failures are logged, never
    /// surfaced to the caller.
    pub(crate) async fn persist_turn(
        &self,
        user_id: &str,
        chat_id: Uuid,
        is_new: bool,
        title: Option<String>,
        turns: &[ChatTurn],
    ) {
        let durable = async {
            if is_new {
                let title = title.as_deref().unwrap_or(FALLBACK_CHAT_TITLE);
                self.store
                    .create_session(user_id, chat_id, title, turns)
                    .await
            } else {
                self.store.append_messages(chat_id, turns).await
            }
        };

        let (_, durable_result) = tokio::join!(self.cache.append(user_id, chat_id, turns), durable);

        if let Err(e) = durable_result {
            error!(
                subsystem = "api",
                component = "chat_orchestrator",
                op = "persist_turn",
                user_id = %user_id,
                chat_id = %chat_id,
                error = %e,
                "Background persistence error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recall_core::defaults::NO_CONTEXT_SENTINEL;
    use recall_core::{
        ChatMessage, ChatSummary, ContextHit, EntityKind, Error, GraphData, GraphEmbeddings,
        JobPayload, Vector,
    };
    use recall_inference::MockInferenceBackend;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory ChatStore recording sessions and messages.
    #[derive(Default)]
    struct MemoryChatStore {
        sessions: Mutex<HashMap<Uuid, (String, String)>>,
        messages: Mutex<HashMap<Uuid, Vec<ChatTurn>>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl ChatStore for MemoryChatStore {
        async fn create_session(
            &self,
            user_id: &str,
            chat_id: Uuid,
            title: &str,
            turns: &[ChatTurn],
        ) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Internal("write failure".into()));
            }
            self.sessions
                .lock()
                .unwrap()
                .insert(chat_id, (user_id.to_string(), title.to_string()));
            self.messages
                .lock()
                .unwrap()
                .entry(chat_id)
                .or_default()
                .extend_from_slice(turns);
            Ok(())
        }

        async fn append_messages(&self, chat_id: Uuid, turns: &[ChatTurn]) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Internal("write failure".into()));
            }
            self.messages
                .lock()
                .unwrap()
                .entry(chat_id)
                .or_default()
                .extend_from_slice(turns);
            Ok(())
        }

        async fn recent_messages(
            &self,
            user_id: &str,
            chat_id: Uuid,
            limit: i64,
        ) -> Result<Vec<ChatTurn>> {
            let sessions = self.sessions.lock().unwrap();
            match sessions.get(&chat_id) {
                Some((owner, _)) if owner == user_id => {}
                _ => return Ok(Vec::new()),
            }
            let messages = self.messages.lock().unwrap();
            let turns = messages.get(&chat_id).cloned().unwrap_or_default();
            let skip = turns.len().saturating_sub(limit as usize);
            Ok(turns.into_iter().skip(skip).collect())
        }

        async fn list_sessions(&self, _user_id: &str) -> Result<Vec<ChatSummary>> {
            Ok(Vec::new())
        }

        async fn session_messages(
            &self,
            _user_id: &str,
            _chat_id: Uuid,
        ) -> Result<Vec<ChatMessage>> {
            Ok(Vec::new())
        }

        async fn delete_session(&self, _user_id: &str, chat_id: Uuid) -> Result<bool> {
            Ok(self.sessions.lock().unwrap().remove(&chat_id).is_some())
        }
    }

    /// Graph stub returning fixed similarity hits.
    struct StubGraph {
        hits: Vec<ContextHit>,
    }

    #[async_trait]
    impl GraphRepository for StubGraph {
        async fn apply_job(&self, _: &JobPayload, _: &GraphEmbeddings) -> Result<()> {
            Ok(())
        }

        async fn similar_entities(
            &self,
            _user_id: &str,
            _query: &Vector,
            _per_kind: i64,
        ) -> Result<Vec<ContextHit>> {
            Ok(self.hits.clone())
        }

        async fn user_subgraph(&self, _user_id: &str) -> Result<GraphData> {
            Ok(GraphData {
                nodes: vec![],
                links: vec![],
            })
        }
    }

    fn service_with(
        store: Arc<MemoryChatStore>,
        hits: Vec<ContextHit>,
        backend: MockInferenceBackend,
    ) -> ChatService {
        let backend = Arc::new(backend);
        ChatService::new(
            HistoryCache::disabled(),
            store,
            Arc::new(StubGraph { hits }),
            backend.clone(),
            backend,
        )
    }

    #[tokio::test]
    async fn test_new_session_returns_fresh_id_and_title() {
        let store = Arc::new(MemoryChatStore::default());
        let backend = MockInferenceBackend::new()
            .with_response_mapping("concise, 5-word title", "\"Reversing Linked Lists\"")
            .with_fixed_response("Walk the list, flipping next pointers.");

        let service = service_with(store, vec![], backend);
        let outcome = service
            .handle_turn("u-1", "How do I reverse a linked list?", None)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Walk the list, flipping next pointers.");
        // Quotes are stripped from the generated title.
        assert_eq!(outcome.title.as_deref(), Some("Reversing Linked Lists"));
    }

    #[tokio::test]
    async fn test_existing_session_skips_title_generation() {
        let store = Arc::new(MemoryChatStore::default());
        let backend = MockInferenceBackend::new().with_fixed_response("answer");

        let service = service_with(store, vec![], backend.clone());
        let chat_id = Uuid::new_v4();
        let outcome = service
            .handle_turn("u-1", "follow-up", Some(chat_id))
            .await
            .unwrap();

        assert_eq!(outcome.chat_id, chat_id);
        assert!(outcome.title.is_none());
        // One generation for the reply, none for a title.
        assert_eq!(backend.generate_call_count(), 1);
    }

    #[tokio::test]
    async fn test_title_failure_falls_back_to_default() {
        let store = Arc::new(MemoryChatStore::default());
        // The reply prompt succeeds; only the secondary title call fails.
        let backend = MockInferenceBackend::new()
            .with_fixed_response("reply")
            .with_failure_mapping("concise, 5-word title", "quota exceeded");

        let service = service_with(store, vec![], backend);
        let outcome = service.handle_turn("u-1", "hello", None).await.unwrap();

        assert_eq!(outcome.reply, "reply");
        assert_eq!(outcome.title.as_deref(), Some(FALLBACK_CHAT_TITLE));
    }

    #[tokio::test]
    async fn test_prompt_carries_context_history_and_question() {
        let history = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let prompt = build_chat_prompt("Relevant Problems:\n- Two Sum", &history, "what next?");

        assert!(prompt.contains("Relevant Problems:\n- Two Sum"));
        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("Assistant: hello"));
        assert!(prompt.trim_end().ends_with("what next?"));
    }

    #[tokio::test]
    async fn test_prompt_omits_history_section_when_empty() {
        let prompt = build_chat_prompt(NO_CONTEXT_SENTINEL, &[], "question");
        assert!(!prompt.contains("CONVERSATION SO FAR"));
        assert!(prompt.contains(NO_CONTEXT_SENTINEL));
    }

    #[tokio::test]
    async fn test_persist_turn_new_session_writes_both_turns() {
        let store = Arc::new(MemoryChatStore::default());
        let backend = MockInferenceBackend::new().with_fixed_response("reply");
        let service = service_with(store.clone(), vec![], backend);

        let chat_id = Uuid::new_v4();
        let turns = vec![ChatTurn::user("question"), ChatTurn::assistant("reply")];
        service
            .persist_turn("u-1", chat_id, true, Some("Title".to_string()), &turns)
            .await;

        let sessions = store.sessions.lock().unwrap();
        assert_eq!(
            sessions.get(&chat_id),
            Some(&("u-1".to_string(), "Title".to_string()))
        );
        let messages = store.messages.lock().unwrap();
        let stored = messages.get(&chat_id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, MessageRole::User);
        assert_eq!(stored[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_the_turn() {
        let store = Arc::new(MemoryChatStore {
            fail_writes: true,
            ..Default::default()
        });
        let backend = MockInferenceBackend::new().with_fixed_response("reply");
        let service = service_with(store, vec![], backend);

        // The reply is returned even though background persistence will fail.
        let outcome = service.handle_turn("u-1", "hello", None).await.unwrap();
        assert_eq!(outcome.reply, "reply");
    }

    #[tokio::test]
    async fn test_generation_failure_fails_the_turn_without_persistence() {
        let store = Arc::new(MemoryChatStore::default());
        // The chat prompt always carries the context header; fail on it.
        let backend = MockInferenceBackend::new()
            .with_failure_mapping("CONTEXT FROM USER'S HISTORY", "model down");

        let service = service_with(store.clone(), vec![], backend);
        let result = service.handle_turn("u-1", "hello", None).await;

        assert!(result.is_err());
        assert!(store.sessions.lock().unwrap().is_empty());
        assert!(store.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieved_context_reaches_the_prompt() {
        let store = Arc::new(MemoryChatStore::default());
        let backend = MockInferenceBackend::new().with_fixed_response("reply");
        let hits = vec![ContextHit {
            kind: EntityKind::Problem,
            name: "Two Sum".to_string(),
            score: 0.9,
        }];

        let service = service_with(store, hits, backend.clone());
        service.handle_turn("u-1", "sums?", None).await.unwrap();

        let generate_inputs: Vec<String> = backend
            .calls()
            .into_iter()
            .filter(|c| c.operation == "generate")
            .map(|c| c.input)
            .collect();
        assert!(generate_inputs
            .iter()
            .any(|p| p.contains("Relevant Problems:\n- Two Sum")));
    }
}
