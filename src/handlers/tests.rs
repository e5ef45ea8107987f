// src/handlers/tests.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::test::{CreateTestRequest, PublicQuestion, Test, TestDetail, TestSummary},
    store::{DocStore, TESTS},
    utils::{html::clean_text, jwt::Claims},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub subject: Option<String>,
    pub q: Option<String>,
}

/// Lists available tests. Correct answers never leave the server here;
/// listings carry metadata only.
#[utoipa::path(
    get,
    path = "/api/tests",
    responses((status = 200, description = "Test summaries", body = [TestSummary]))
)]
pub async fn list_tests(
    State(store): State<DocStore>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut docs = store.list::<Test>(TESTS).await?;

    if let Some(subject) = &params.subject {
        docs.retain(|doc| doc.data.subject.eq_ignore_ascii_case(subject));
    }
    if let Some(q) = &params.q {
        let q = q.to_lowercase();
        docs.retain(|doc| doc.data.title.to_lowercase().contains(&q));
    }
    docs.reverse();

    let summaries: Vec<TestSummary> = docs.iter().map(TestSummary::from).collect();
    Ok(Json(summaries))
}

/// Retrieves one test for the pre-start preview: metadata plus questions
/// with the answers stripped.
#[utoipa::path(
    get,
    path = "/api/tests/{id}",
    responses(
        (status = 200, description = "Test detail without answers", body = TestDetail),
        (status = 404, description = "No such test"),
    )
)]
pub async fn get_test(
    State(store): State<DocStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let docs = store.list::<Test>(TESTS).await?;
    let doc = docs
        .into_iter()
        .find(|doc| doc.id == id)
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    Ok(Json(TestDetail {
        id: doc.id,
        title: doc.data.title,
        subject: doc.data.subject,
        duration: doc.data.duration,
        total_marks: doc.data.total_marks,
        questions: doc.data.questions.iter().map(PublicQuestion::from).collect(),
    }))
}

/// Creates a new test from the authoring flow. Question lists assembled by
/// hand and lists pasted from the AI generation route arrive identically.
#[utoipa::path(
    post,
    path = "/api/tests/create",
    request_body = CreateTestRequest,
    responses(
        (status = 201, description = "Test stored"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not logged in"),
    )
)]
pub async fn create_test(
    State(store): State<DocStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut questions = payload.questions;
    for q in &mut questions {
        q.text = clean_text(&q.text);
        if let Some(explanation) = &q.explanation {
            q.explanation = Some(clean_text(explanation));
        }
    }

    let test = Test {
        title: clean_text(&payload.title),
        subject: clean_text(&payload.subject),
        duration: payload.duration,
        total_marks: payload.total_marks,
        questions,
        created_by: claims.user_id(),
        created_by_email: claims.email.clone(),
        created_at: Utc::now(),
    };

    let id = store.add(TESTS, &test).await.map_err(|e| {
        tracing::error!("Failed to store test: {}", e);
        e
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
