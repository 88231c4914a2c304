pub mod conversation_actor;
pub mod message_router;
pub mod messages;

pub use message_router::ConversationHandle;
pub use messages::UserContent;
