//! Bakery Relay - LINE webhook relay for LLM conversations
//!
//! Receives messaging webhooks, keeps a per-user conversation history,
//! asks a chat-completion API for the next reply and sends it back to the
//! user. Images are copied to blob storage and handed to the model by URL.

pub mod actors;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod media;
pub mod reply;
pub mod storage;
pub mod utils;
pub mod webhook;

pub use config::Settings;
pub use error::{ErrorKind, RelayError};

// Re-export the conversation entry point and its content type
pub use actors::{ConversationHandle, UserContent};

use std::sync::Arc;

use api::AppState;
use crate::core::blob::AzureBlobClient;
use crate::core::line::{LineClient, MessagingPlatform};
use crate::core::llm::LLMClient;
use media::MediaRelay;
use storage::InMemoryStore;
use webhook::WebhookHandler;

/// Conversation router backed by the in-memory store and the completion API.
pub fn build_conversations(settings: &Settings) -> anyhow::Result<ConversationHandle> {
    let api_key = Settings::api_key()?;
    let gateway = LLMClient::new(api_key, settings.llm.clone())?;
    let store = InMemoryStore::new(settings.conversation.system_prompt.clone());

    Ok(ConversationHandle::new(
        Arc::new(store),
        Arc::new(gateway),
        settings.system.channel_buffer_size,
    ))
}

/// Wire the webhook handler to the real platform, completion and storage clients.
pub fn build_webhook_handler(settings: &Settings) -> anyhow::Result<WebhookHandler> {
    let channel_secret = Settings::channel_secret()?;
    let access_token = Settings::channel_access_token()?;

    let conversations = build_conversations(settings)?;
    let platform: Arc<dyn MessagingPlatform> =
        Arc::new(LineClient::new(access_token, settings.line.clone()));

    let media = match Settings::storage_connection_string() {
        Some(connection) => {
            let blobs =
                AzureBlobClient::from_connection_string(&connection, &settings.storage.container)?;
            tracing::info!(
                "Image relay enabled for container '{}'",
                settings.storage.container
            );
            Some(MediaRelay::new(
                platform.clone(),
                Arc::new(blobs),
                &settings.storage,
            ))
        }
        None => {
            tracing::warn!(
                "AZURE_STORAGE_ACCOUNT_CONNECTION_KEY not set, image messages will be ignored"
            );
            None
        }
    };

    Ok(WebhookHandler::new(
        channel_secret,
        conversations,
        platform,
        media,
        &settings.conversation,
    ))
}

/// Run the webhook server until Ctrl+C.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let handler = build_webhook_handler(&settings)?;
    let conversations = handler.conversations().clone();

    let app = api::create_router(
        Arc::new(AppState { webhook: handler }),
        &settings.server.webhook_path,
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Listening on {} (webhook at {})",
        addr,
        settings.server.webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    conversations.shutdown().await?;
    tracing::info!("Bakery relay shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
