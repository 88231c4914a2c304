use std::sync::Arc;
use tokio::sync::mpsc::{channel, error::SendError, Receiver, Sender};

use crate::actors::messages::*;
use crate::core::llm::{ChatMessage, CompletionGateway};
use crate::error::RelayError;
use crate::storage::{has_dangling_turn, ConversationStore};

/// Single writer for one user's history. Turns for the same user run one at
/// a time in arrival order.
#[derive(Debug, Clone)]
pub struct ConversationActorHandle {
    sender: Sender<TurnRequest>,
}

impl ConversationActorHandle {
    pub fn new(
        user_id: String,
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn CompletionGateway>,
        buffer_size: usize,
    ) -> Self {
        let (sender, receiver) = channel(buffer_size);
        tokio::spawn(conversation_actor(receiver, user_id, store, gateway));
        Self { sender }
    }

    pub async fn send_message(&self, request: TurnRequest) {
        if let Err(SendError(request)) = self.sender.send(request).await {
            tracing::error!(
                "Conversation actor for user {} is gone",
                request.user_id
            );
            let _ = request.response.send(Err(RelayError::WorkerUnavailable(
                "conversation actor stopped".to_string(),
            )));
        }
    }
}

async fn conversation_actor(
    mut receiver: Receiver<TurnRequest>,
    user_id: String,
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn CompletionGateway>,
) {
    tracing::debug!("Conversation actor started for user {}", user_id);

    while let Some(request) = receiver.recv().await {
        let result = run_turn(
            &request.user_id,
            request.content,
            store.as_ref(),
            gateway.as_ref(),
        )
        .await;
        let _ = request.response.send(result);
    }

    tracing::debug!("Conversation actor for user {} shutting down", user_id);
}

/// Append the user turn, ask the gateway, append the reply.
///
/// A gateway failure leaves the user turn in history without a reply; the
/// next turn for that user logs it as dangling.
pub async fn run_turn(
    user_id: &str,
    content: UserContent,
    store: &dyn ConversationStore,
    gateway: &dyn CompletionGateway,
) -> Result<String, RelayError> {
    let mut history = store.get(user_id).await?;
    if has_dangling_turn(&history) {
        tracing::warn!(
            "Previous turn for user {} has no assistant reply",
            user_id
        );
    }

    let message = content.into_message();
    store.append(user_id, message.clone()).await?;
    history.push(message);

    let reply = gateway.complete(&history).await.map_err(|e| {
        tracing::error!("Completion failed for user {}: {}", user_id, e);
        e
    })?;

    let assistant = ChatMessage::assistant(reply.clone());
    store.append(user_id, assistant.clone()).await?;
    history.push(assistant);

    tracing::info!("Updating chat history for user {}", user_id);
    match serde_json::to_string_pretty(&history) {
        Ok(json) => tracing::debug!("{}", json),
        Err(e) => tracing::debug!("Could not render history for user {}: {}", user_id, e),
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::{LlmError, Role};
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedGateway {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        seen: Mutex<Vec<usize>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionGateway for ScriptedGateway {
        async fn complete(&self, history: &[ChatMessage]) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(history.len());
            self.replies.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn test_turn_appends_user_and_assistant() {
        let store = InMemoryStore::new("sys");
        let gateway = ScriptedGateway::new(vec![Ok("Proof for 1 hour.".to_string())]);

        let reply = run_turn(
            "U1",
            UserContent::Text("How long to proof dough?".to_string()),
            &store,
            &gateway,
        )
        .await
        .unwrap();

        assert_eq!(reply, "Proof for 1 hour.");
        let history = store.get("U1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], ChatMessage::user("How long to proof dough?"));
        assert_eq!(history[2], ChatMessage::assistant("Proof for 1 hour."));
        // The gateway saw system + the new user turn.
        assert_eq!(*gateway.seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_orphan_user_message() {
        let store = InMemoryStore::new("sys");
        let gateway = ScriptedGateway::new(vec![
            Err(LlmError::EmptyResponse),
            Ok("second".to_string()),
        ]);

        let err = run_turn("U1", UserContent::Text("q1".into()), &store, &gateway)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));

        let history = store.get("U1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::User);

        // Retrying appends another user turn; the orphan stays.
        run_turn("U1", UserContent::Text("q1".into()), &store, &gateway)
            .await
            .unwrap();
        let history = store.get("U1").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1], ChatMessage::user("q1"));
        assert_eq!(history[2], ChatMessage::user("q1"));
        assert_eq!(history[3], ChatMessage::assistant("second"));
    }

    #[tokio::test]
    async fn test_actor_serializes_turns() {
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryStore::new("sys"));
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok("a1".to_string()),
            Ok("a2".to_string()),
        ]));
        let handle = ConversationActorHandle::new("U1".to_string(), store.clone(), gateway.clone(), 4);

        let (tx1, rx1) = tokio::sync::oneshot::channel();
        let (tx2, rx2) = tokio::sync::oneshot::channel();
        handle
            .send_message(TurnRequest {
                user_id: "U1".to_string(),
                content: UserContent::Text("q1".into()),
                response: tx1,
            })
            .await;
        handle
            .send_message(TurnRequest {
                user_id: "U1".to_string(),
                content: UserContent::Text("q2".into()),
                response: tx2,
            })
            .await;

        assert_eq!(rx1.await.unwrap().unwrap(), "a1");
        assert_eq!(rx2.await.unwrap().unwrap(), "a2");

        // Second turn saw the completed first turn.
        assert_eq!(*gateway.seen.lock().unwrap(), vec![2, 4]);
        assert_eq!(store.len("U1").await.unwrap(), 5);
    }
}
