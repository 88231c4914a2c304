//! Conversation Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Call sites only see per-user lookup with a seeded default on miss
//! - A shared backend with its own concurrency control can replace the
//!   in-memory map without touching the conversation workers

use crate::core::llm::{ChatMessage, Role};
use anyhow::Result;
use async_trait::async_trait;

pub mod memory;

pub use memory::InMemoryStore;

/// Per-user, append-only conversation history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// History for `user_id`, or a fresh history holding only the system
    /// instruction when the user has not been seen.
    async fn get(&self, user_id: &str) -> Result<Vec<ChatMessage>>;

    /// Add `message` to the end of the user's history.
    async fn append(&self, user_id: &str, message: ChatMessage) -> Result<()>;

    /// Users with at least one stored message.
    async fn users(&self) -> Result<Vec<String>>;

    async fn len(&self, user_id: &str) -> Result<usize> {
        Ok(self.get(user_id).await?.len())
    }
}

/// True when the newest entry is a user turn with no assistant reply after it.
pub fn has_dangling_turn(history: &[ChatMessage]) -> bool {
    history.last().map(|m| m.role == Role::User).unwrap_or(false)
}
