use axum::http::StatusCode;
use thiserror::Error;

use crate::core::blob::BlobError;
use crate::core::line::PlatformError;
use crate::core::llm::LlmError;

/// How a failed webhook request is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request did not come from the platform (HTTP 400).
    BadRequest,
    /// Handling a verified request failed (HTTP 500).
    Internal,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing signature")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Malformed webhook body: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("Completion request failed: {0}")]
    Upstream(#[from] LlmError),
    #[error("Media download failed: {0}")]
    MediaDownload(#[source] PlatformError),
    #[error("Media upload failed: {0}")]
    MediaUpload(#[from] BlobError),
    #[error("Media cache write failed: {0}")]
    MediaCache(#[from] std::io::Error),
    #[error("Reply failed: {0}")]
    Reply(#[source] PlatformError),
    #[error("Conversation store failed: {0}")]
    Store(#[from] anyhow::Error),
    #[error("Conversation worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSignature | Self::InvalidSignature => ErrorKind::BadRequest,
            _ => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_errors_are_bad_requests() {
        assert_eq!(RelayError::MissingSignature.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::InvalidSignature.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::MissingSignature.to_string(), "Missing signature");
    }

    #[test]
    fn test_upstream_errors_are_internal() {
        let err = RelayError::from(LlmError::EmptyResponse);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = RelayError::WorkerUnavailable("closed".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
