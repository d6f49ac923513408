//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medrag_core::RagError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Detail returned when `/chat` is called before an index exists
pub const INDEX_UNAVAILABLE_DETAIL: &str =
    "Vector database not initialized. Run `medrag ingest` first.";

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message
    #[schema(example = "Vector database not initialized. Run `medrag ingest` first.")]
    pub detail: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// No index is loaded
    IndexUnavailable,
    /// Request body failed validation
    Validation(String),
    /// Retrieval or generation failed
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::IndexUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INDEX_UNAVAILABLE_DETAIL.to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), detail = %detail, "Request failed");
        }

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::ValidationError(msg) => AppError::Validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_error_mapping() {
        assert!(matches!(
            AppError::from(RagError::ValidationError("blank".into())),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(RagError::LlmError("502".into())),
            AppError::Internal(ref msg) if msg == "LLM error: 502"
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::IndexUnavailable.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Validation("x".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
