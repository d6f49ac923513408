//! Chat handlers
//!
//! Author: hephaex@gmail.com

use crate::error::{AppError, ErrorResponse};
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Status reported by `GET /`
pub const STATUS_MESSAGE: &str = "Medical chatbot API is running";

/// Service status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "Medical chatbot API is running")]
    pub status: String,
}

/// Chat request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    /// User's question
    #[validate(custom(function = "not_blank"))]
    #[schema(example = "What are the symptoms of anemia?")]
    pub question: String,
}

/// Chat response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    /// Generated answer
    #[schema(example = "Common symptoms of anemia include fatigue and pale skin.")]
    pub answer: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be empty".into()));
    }
    Ok(())
}

/// Report that the service is up
#[utoipa::path(
    get,
    path = "/",
    tag = "chat",
    responses(
        (status = 200, description = "Service is running", body = StatusResponse)
    )
)]
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: STATUS_MESSAGE.to_string(),
    })
}

/// Answer a medical question from the indexed document
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer generated", body = ChatResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Index missing or generation failed", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let pipeline = state.pipeline().ok_or(AppError::IndexUnavailable)?;

    tracing::info!(question_chars = req.question.chars().count(), "Chat request");
    let answer = pipeline.answer(&req.question).await?;

    Ok(Json(ChatResponse { answer }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_validation() {
        let ok = ChatRequest {
            question: "What is anemia?".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank = ChatRequest {
            question: " \n\t".to_string(),
        };
        assert!(blank.validate().is_err());
    }
}
