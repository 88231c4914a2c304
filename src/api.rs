//! HTTP surface
//!
//! A single webhook route for the messaging platform plus a health check.
//! Relay errors are mapped to status codes here and nowhere else.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::error::{ErrorKind, RelayError};
use crate::webhook::{signature::SIGNATURE_HEADER, WebhookHandler};

/// Shared application state for the HTTP API.
pub struct AppState {
    pub webhook: WebhookHandler,
}

/// Create the axum Router with the webhook mounted at `webhook_path`.
pub fn create_router(state: Arc<AppState>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(handle_line_webhook))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_line_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    tracing::info!("Received a request.");
    tracing::info!("Request body: {}", String::from_utf8_lossy(&body));

    // A header that is present but not text can never verify.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|value| value.to_str().unwrap_or(""));

    state.webhook.handle(signature, &body).await?;
    Ok("OK")
}

async fn handle_health() -> &'static str {
    "OK"
}

struct AppError(RelayError);

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = err.status_code();
        let body = match err.kind() {
            ErrorKind::BadRequest => err.to_string(),
            ErrorKind::Internal => {
                tracing::error!("Error: {}", err);
                format!("Error: {}", err)
            }
        };
        (status, body).into_response()
    }
}
