// src/handlers/ai.rs
//
// Thin HTTP wrappers around the AI façade. No retry and no fallback: a
// failed or unusable upstream reply becomes one error response and the
// caller is back on the idle view.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    ai::{Difficulty, GeneratedQuestion, PaperAnalysis},
    error::AppError,
    state::AppState,
};

fn default_count() -> u8 {
    5
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GenerateQuestionsRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 20))]
    #[serde(default = "default_count")]
    pub count: u8,
}

/// An image travelling to the vision model: mime type plus base64 payload.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[validate(custom(function = validate_image_mime))]
    pub mime_type: String,
    /// Base64-encoded image bytes.
    #[validate(length(min = 1, max = 14_000_000))]
    pub data: String,
}

fn validate_image_mime(mime_type: &str) -> Result<(), validator::ValidationError> {
    if !mime_type.starts_with("image/") {
        return Err(validator::ValidationError::new("not_an_image_mime_type"));
    }
    Ok(())
}

/// Generates MCQs for a subject/topic/difficulty/count tuple.
#[utoipa::path(
    post,
    path = "/api/ai/questions",
    request_body = GenerateQuestionsRequest,
    responses(
        (status = 200, description = "Generated questions", body = [GeneratedQuestion]),
        (status = 422, description = "Reply contained no usable JSON"),
        (status = 502, description = "Upstream failed or key not configured"),
    )
)]
pub async fn generate_questions(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let questions = state
        .ai
        .generate_questions(
            &payload.subject,
            &payload.topic,
            payload.difficulty,
            payload.count,
        )
        .await?;

    tracing::info!(
        subject = %payload.subject,
        topic = %payload.topic,
        count = questions.len(),
        "generated questions"
    );

    Ok(Json(questions))
}

/// Transcribes a photographed page of handwritten notes to plain text.
#[utoipa::path(
    post,
    path = "/api/ai/ocr",
    request_body = ImagePayload,
    responses(
        (status = 200, description = "Transcribed text"),
        (status = 502, description = "Upstream failed or key not configured"),
    )
)]
pub async fn transcribe_notes(
    State(state): State<AppState>,
    Json(payload): Json<ImagePayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let text = state
        .ai
        .transcribe_notes(&payload.mime_type, &payload.data)
        .await?;

    Ok(Json(json!({ "text": text })))
}

/// Extracts a structured test (title, subject, marks, questions) from a
/// photographed question paper.
#[utoipa::path(
    post,
    path = "/api/ai/paper-analysis",
    request_body = ImagePayload,
    responses(
        (status = 200, description = "Structured paper", body = PaperAnalysis),
        (status = 422, description = "Reply contained no usable JSON"),
        (status = 502, description = "Upstream failed or key not configured"),
    )
)]
pub async fn analyze_paper(
    State(state): State<AppState>,
    Json(payload): Json<ImagePayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let paper = state
        .ai
        .analyze_question_paper(&payload.mime_type, &payload.data)
        .await?;

    Ok(Json(paper))
}
