use std::fmt;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Which remote capability a provider failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    Embedding,
    ChatCompletion,
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCall::Embedding => f.write_str("embedding"),
            RemoteCall::ChatCompletion => f.write_str("chat completion"),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Chat completion error: {0}")]
    ChatCompletion(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("The {call} call timed out after {secs}s")]
    Timeout { call: RemoteCall, secs: u64 },

    #[error("The {call} call failed after {attempts} attempts: {last}")]
    RetryExhausted {
        call: RemoteCall,
        attempts: u32,
        last: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a provider failure, keeping timeouts and exhausted retries distinct.
    pub fn remote(call: RemoteCall, err: LlmError) -> Self {
        match err {
            LlmError::Timeout { secs } => AppError::Timeout { call, secs },
            LlmError::RetryExhausted { attempts, last } => AppError::RetryExhausted {
                call,
                attempts,
                last,
            },
            other => match call {
                RemoteCall::Embedding => AppError::Embedding(other.to_string()),
                RemoteCall::ChatCompletion => AppError::ChatCompletion(other.to_string()),
            },
        }
    }
}

// Extractor rejections become validation errors so every failure shares the JSON envelope.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Extraction(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_ERROR",
                format!("Could not read the uploaded documents: {msg}"),
            ),
            AppError::Embedding(msg) => {
                tracing::error!("Embedding error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "EMBEDDING_ERROR",
                    "The embedding provider rejected the request".to_string(),
                )
            }
            AppError::ChatCompletion(msg) => {
                tracing::error!("Chat completion error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "CHAT_COMPLETION_ERROR",
                    "The chat provider rejected the request".to_string(),
                )
            }
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
            AppError::Timeout { call, secs } => {
                tracing::error!("{call} call timed out after {secs}s");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    format!("The {call} provider did not answer within {secs}s"),
                )
            }
            AppError::RetryExhausted {
                call,
                attempts,
                last,
            } => {
                tracing::error!("{call} call failed after {attempts} attempts: {last}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "RETRY_EXHAUSTED",
                    format!("The {call} provider is unavailable, gave up after {attempts} attempts"),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
