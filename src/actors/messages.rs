use tokio::sync::oneshot;

use crate::actors::conversation_actor::ConversationActorHandle;
use crate::core::llm::ChatMessage;
use crate::error::RelayError;

/// What the user contributed to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserContent {
    Text(String),
    /// Public URL of an image the user sent.
    Image(String),
}

impl UserContent {
    pub fn into_message(self) -> ChatMessage {
        match self {
            UserContent::Text(text) => ChatMessage::user(text),
            UserContent::Image(url) => ChatMessage::user_image(url),
        }
    }
}

/// One conversation turn; the response carries the unsplit assistant reply.
#[derive(Debug)]
pub struct TurnRequest {
    pub user_id: String,
    pub content: UserContent,
    pub response: oneshot::Sender<Result<String, RelayError>>,
}

#[derive(Debug)]
pub enum RoutingMessage {
    /// Look up (or spawn) the worker for `user_id`. The router only hands the
    /// worker back; the caller queues its turn on that user's own channel.
    Worker {
        user_id: String,
        respond_to: oneshot::Sender<ConversationActorHandle>,
    },
    Shutdown,
}
