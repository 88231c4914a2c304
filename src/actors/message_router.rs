use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;

use crate::actors::conversation_actor::ConversationActorHandle;
use crate::actors::messages::*;
use crate::core::llm::CompletionGateway;
use crate::error::RelayError;
use crate::storage::ConversationStore;

/// Entry point for conversation turns. Cloning shares the same router.
#[derive(Clone)]
pub struct ConversationHandle {
    sender: Sender<RoutingMessage>,
}

impl ConversationHandle {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn CompletionGateway>,
        buffer_size: usize,
    ) -> Self {
        let (sender, receiver) = channel(buffer_size);
        tokio::spawn(router_actor(receiver, store, gateway, buffer_size));
        Self { sender }
    }

    /// Run one turn for `user_id` and return the unsplit assistant reply.
    ///
    /// Only the worker lookup goes through the router. A backlog of turns for
    /// one user waits on that user's channel and never holds up the router.
    pub async fn turn(&self, user_id: &str, content: UserContent) -> Result<String, RelayError> {
        let (respond_to, worker) = oneshot::channel();
        self.sender
            .send(RoutingMessage::Worker {
                user_id: user_id.to_string(),
                respond_to,
            })
            .await
            .map_err(|e| RelayError::WorkerUnavailable(format!("router: {}", e)))?;
        let worker = worker
            .await
            .map_err(|e| RelayError::WorkerUnavailable(format!("router dropped lookup: {}", e)))?;

        let (response, rx) = oneshot::channel();
        worker
            .send_message(TurnRequest {
                user_id: user_id.to_string(),
                content,
                response,
            })
            .await;

        rx.await
            .map_err(|e| RelayError::WorkerUnavailable(format!("turn dropped: {}", e)))?
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.sender
            .send(RoutingMessage::Shutdown)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send shutdown to router: {}", e))
    }
}

async fn router_actor(
    mut receiver: Receiver<RoutingMessage>,
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn CompletionGateway>,
    buffer_size: usize,
) {
    tracing::info!("Conversation router started");

    let mut workers: HashMap<String, ConversationActorHandle> = HashMap::new();

    while let Some(message) = receiver.recv().await {
        match message {
            RoutingMessage::Worker {
                user_id,
                respond_to,
            } => {
                let worker = workers.entry(user_id).or_insert_with_key(|user_id| {
                    ConversationActorHandle::new(
                        user_id.clone(),
                        store.clone(),
                        gateway.clone(),
                        buffer_size,
                    )
                });
                // The caller may have given up; nothing to do then.
                let _ = respond_to.send(worker.clone());
            }
            RoutingMessage::Shutdown => {
                tracing::info!("Conversation router received shutdown signal");
                break;
            }
        }
    }

    tracing::info!(
        "Conversation router stopped with {} user workers",
        workers.len()
    );
}
