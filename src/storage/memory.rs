//! In-Memory Conversation Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Histories live for the process lifetime; nothing is evicted

use super::ConversationStore;
use crate::core::llm::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store seeded with a fixed system instruction.
/// Data is lost when process terminates
pub struct InMemoryStore {
    system_prompt: String,
    histories: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
}

impl InMemoryStore {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            histories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn seed(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system_prompt.clone())]
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        let histories = self.histories.read().await;
        let history = histories
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| self.seed());
        tracing::debug!(
            "[InMemoryStore] Loaded {} messages for user '{}'",
            history.len(),
            user_id
        );
        Ok(history)
    }

    async fn append(&self, user_id: &str, message: ChatMessage) -> Result<()> {
        let mut histories = self.histories.write().await;
        let history = histories
            .entry(user_id.to_string())
            .or_insert_with(|| self.seed());
        history.push(message);
        tracing::debug!(
            "[InMemoryStore] History for user '{}' now has {} messages",
            user_id,
            history.len()
        );
        Ok(())
    }

    async fn users(&self) -> Result<Vec<String>> {
        let histories = self.histories.read().await;
        Ok(histories.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::Role;
    use crate::storage::has_dangling_turn;

    #[tokio::test]
    async fn test_unknown_user_gets_seeded_history() {
        let store = InMemoryStore::new("You are a baker.");

        let history = store.get("U-new").await.unwrap();
        assert_eq!(history, vec![ChatMessage::system("You are a baker.")]);

        // Reading does not create an entry.
        assert!(store.users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryStore::new("sys");

        store.append("U1", ChatMessage::user("Hello")).await.unwrap();
        store
            .append("U1", ChatMessage::assistant("Hi there"))
            .await
            .unwrap();

        let history = store.get("U1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[1].text(), Some("Hello"));
        assert_eq!(history[2].text(), Some("Hi there"));
        assert_eq!(store.len("U1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = InMemoryStore::new("sys");

        store.append("U1", ChatMessage::user("one")).await.unwrap();
        store.append("U2", ChatMessage::user("two")).await.unwrap();
        store
            .append("U2", ChatMessage::assistant("reply"))
            .await
            .unwrap();

        assert_eq!(store.len("U1").await.unwrap(), 2);
        assert_eq!(store.len("U2").await.unwrap(), 3);

        let mut users = store.users().await.unwrap();
        users.sort();
        assert_eq!(users, vec!["U1".to_string(), "U2".to_string()]);
    }

    #[tokio::test]
    async fn test_dangling_turn_detection() {
        let store = InMemoryStore::new("sys");
        assert!(!has_dangling_turn(&store.get("U1").await.unwrap()));

        store.append("U1", ChatMessage::user("q")).await.unwrap();
        assert!(has_dangling_turn(&store.get("U1").await.unwrap()));

        store.append("U1", ChatMessage::assistant("a")).await.unwrap();
        assert!(!has_dangling_turn(&store.get("U1").await.unwrap()));
    }
}
