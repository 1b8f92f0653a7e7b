//! Service layer: conversation cache and chat orchestration.

pub mod chat;
pub mod history_cache;

pub use chat::{ChatService, ChatTurnOutcome};
pub use history_cache::{history_key, HistoryCache};
