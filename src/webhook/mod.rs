//! Inbound Event Router
//!
//! Verifies a webhook request, then hands each event to the handler for its
//! message type. Handlers share the conversation router, the platform client
//! and the optional media relay; nothing is held in module-level state.

pub mod events;
pub mod signature;

use std::sync::Arc;

use crate::actors::{ConversationHandle, UserContent};
use crate::config::ConversationConfig;
use crate::core::line::{MessagingPlatform, OutboundMessage};
use crate::error::RelayError;
use crate::media::MediaRelay;
use crate::reply::format_reply;

pub use events::{EventMessage, EventSource, MessageEvent, WebhookEvent, WebhookPayload};

pub struct WebhookHandler {
    channel_secret: String,
    conversations: ConversationHandle,
    platform: Arc<dyn MessagingPlatform>,
    media: Option<MediaRelay>,
    reply_delimiter: String,
    apology_message: Option<String>,
}

impl WebhookHandler {
    pub fn new(
        channel_secret: impl Into<String>,
        conversations: ConversationHandle,
        platform: Arc<dyn MessagingPlatform>,
        media: Option<MediaRelay>,
        settings: &ConversationConfig,
    ) -> Self {
        Self {
            channel_secret: channel_secret.into(),
            conversations,
            platform,
            media,
            reply_delimiter: settings.reply_delimiter.clone(),
            apology_message: settings.apology_message.clone(),
        }
    }

    pub fn conversations(&self) -> &ConversationHandle {
        &self.conversations
    }

    /// Verify and process one webhook delivery. Events run in order and the
    /// first failure aborts the rest.
    pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<(), RelayError> {
        let Some(signature) = signature else {
            tracing::error!("Missing X-Line-Signature header.");
            return Err(RelayError::MissingSignature);
        };

        if !signature::verify(&self.channel_secret, body, signature) {
            tracing::error!("Invalid signature.");
            return Err(RelayError::InvalidSignature);
        }

        let payload: WebhookPayload = serde_json::from_slice(body)?;
        tracing::debug!("Verified webhook with {} events", payload.events.len());

        for event in payload.events {
            self.dispatch(event).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, event: WebhookEvent) -> Result<(), RelayError> {
        let WebhookEvent::Message(event) = event else {
            tracing::debug!("Ignoring non-message event");
            return Ok(());
        };

        if matches!(event.message, EventMessage::Unsupported) {
            tracing::debug!("Ignoring unsupported message type");
            return Ok(());
        }

        let Some(user_id) = event.source.user_id.as_deref() else {
            tracing::warn!("Ignoring message from {} source without a user id", event.source.kind);
            return Ok(());
        };
        let Some(reply_token) = event.reply_token.as_deref() else {
            tracing::warn!("Ignoring message from user {} without a reply token", user_id);
            return Ok(());
        };

        let result = match &event.message {
            EventMessage::Text { text, .. } => self.handle_text(user_id, reply_token, text).await,
            EventMessage::Image { id } => self.handle_image(user_id, reply_token, id).await,
            EventMessage::Unsupported => Ok(()),
        };

        if let Err(err) = &result {
            self.apologize(reply_token, err).await;
        }
        result
    }

    async fn handle_text(
        &self,
        user_id: &str,
        reply_token: &str,
        text: &str,
    ) -> Result<(), RelayError> {
        tracing::info!("Message from Line user {}: {}", user_id, text);

        let reply = self
            .conversations
            .turn(user_id, UserContent::Text(text.to_string()))
            .await?;
        self.send_reply(reply_token, &reply).await
    }

    async fn handle_image(
        &self,
        user_id: &str,
        reply_token: &str,
        message_id: &str,
    ) -> Result<(), RelayError> {
        let Some(media) = &self.media else {
            tracing::info!(
                "Image relay not configured, ignoring image {} from user {}",
                message_id,
                user_id
            );
            return Ok(());
        };

        tracing::info!("Image from Line user {} for message {}", user_id, message_id);

        let url = media.relay(message_id, user_id).await?;
        let reply = self
            .conversations
            .turn(user_id, UserContent::Image(url))
            .await?;
        self.send_reply(reply_token, &reply).await
    }

    async fn send_reply(&self, reply_token: &str, reply: &str) -> Result<(), RelayError> {
        let messages = format_reply(reply, &self.reply_delimiter);
        tracing::info!("Replies from OpenAI: {:?}", messages);

        self.platform
            .reply(reply_token, &messages)
            .await
            .map_err(RelayError::Reply)
    }

    /// Best-effort apology using the event's reply token, when configured.
    async fn apologize(&self, reply_token: &str, err: &RelayError) {
        let Some(apology) = &self.apology_message else {
            return;
        };
        // A failed reply may already have consumed the token.
        if matches!(err, RelayError::Reply(_)) {
            return;
        }

        if let Err(e) = self
            .platform
            .reply(reply_token, &[OutboundMessage::text(apology.clone())])
            .await
        {
            tracing::warn!("Failed to send apology: {}", e);
        }
    }
}
