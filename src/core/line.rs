//! LINE Messaging API client
//!
//! Covers the two calls the relay makes against the platform: the one-shot
//! reply keyed by a reply token, and binary content retrieval for media
//! messages.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LineConfig;

/// A message sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text { text: String },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LINE API error {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Send `messages` as a single batched reply. The token is single use.
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), PlatformError>;

    /// Raw bytes of a media message.
    async fn fetch_content(&self, message_id: &str) -> Result<Vec<u8>, PlatformError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [OutboundMessage],
}

pub struct LineClient {
    client: Client,
    access_token: String,
    settings: LineConfig,
}

impl LineClient {
    pub fn new(access_token: String, settings: LineConfig) -> Self {
        Self {
            client: Client::new(),
            access_token,
            settings,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::warn!("[LineClient] API returned error status {}: {}", status, body);
    Err(PlatformError::Api { status, body })
}

#[async_trait]
impl MessagingPlatform for LineClient {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/v2/bot/message/reply",
            self.settings.api_base.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&ReplyRequest {
                reply_token,
                messages,
            })
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!("[LineClient] Sent {} reply messages", messages.len());
        Ok(())
    }

    async fn fetch_content(&self, message_id: &str) -> Result<Vec<u8>, PlatformError> {
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.settings.data_api_base.trim_end_matches('/'),
            message_id
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;

        tracing::debug!(
            "[LineClient] Fetched {} bytes for message {}",
            bytes.len(),
            message_id
        );
        Ok(bytes.to_vec())
    }
}
