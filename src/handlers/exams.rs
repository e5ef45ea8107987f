// src/handlers/exams.rs
//
// HTTP surface of the test-taking flow. Every route locks the exam
// registry, mutates the caller's session through the state machine, and
// releases the lock before responding. The submit path holds the lock
// across the persist so the one-second timer task can never double-write
// a result.

use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    exam::{ExamOutcome, ExamRegistry, ExamSession, Tick},
    models::{
        test::{PublicQuestion, Question, Test},
        test_result::{ResultSummary, TestResult},
    },
    state::AppState,
    store::{DocStore, TEST_RESULTS, TESTS},
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartExamRequest {
    pub test_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartExamResponse {
    pub session_id: Uuid,
    pub test_id: String,
    pub title: String,
    pub duration: i64,
    pub total_marks: f64,
    pub remaining_secs: u32,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamStatusResponse {
    pub state: &'static str,
    pub remaining_secs: u32,
    pub cursor: usize,
    pub answers: Vec<i32>,
    pub question_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// Question index, 0-based.
    pub question: usize,
    /// Chosen option, 0-3.
    pub option: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NavigateRequest {
    pub direction: Direction,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentQuestionResponse {
    pub cursor: usize,
    pub question_count: usize,
    pub question: PublicQuestion,
}

/// Per-question line of the post-submit review.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    /// -1 when the slot was left unanswered.
    pub your_answer: i32,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultResponse {
    /// Id of the persisted TestResult; absent on the review view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    pub test_id: String,
    pub score: f64,
    pub total_marks: f64,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub time_taken: i64,
    pub review: Vec<ReviewItem>,
}

fn build_review(questions: &[Question], answers: &[i32]) -> Vec<ReviewItem> {
    questions
        .iter()
        .zip(answers.iter())
        .map(|(q, &your_answer)| ReviewItem {
            question: q.text.clone(),
            options: q.options.clone(),
            correct_answer: q.correct_answer,
            your_answer,
            correct: your_answer == q.correct_answer as i32,
            explanation: q.explanation.clone(),
        })
        .collect()
}

/// Persists the graded outcome and flips the session to Submitted.
///
/// Must be called with the registry lock held. On a store failure the
/// session stays InProgress and the error propagates; the timer task will
/// retry an expired session on its next tick.
async fn finalize_session(
    store: &DocStore,
    session: &mut ExamSession,
) -> Result<(String, ExamOutcome), AppError> {
    let outcome = session.grade()?;

    let result = TestResult {
        test_id: session.test_id.clone(),
        user_id: session.user_id,
        user_email: session.user_email.clone(),
        answers: outcome.answers.clone(),
        score: outcome.score,
        total_questions: outcome.total_questions,
        correct_answers: outcome.correct_answers,
        time_taken: outcome.time_taken,
        submitted_at: Utc::now(),
    };

    let result_id = store.add(TEST_RESULTS, &result).await?;
    session.complete(outcome.clone())?;

    Ok((result_id, outcome))
}

/// Drives one session's countdown. Ticks once a second under the registry
/// lock; on expiry it forces a submit with whatever answers are set. Stops
/// once the session leaves InProgress or disappears from the registry.
async fn run_exam_timer(exams: ExamRegistry, store: DocStore, session_id: Uuid) {
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut sessions = exams.lock().await;
        let Some(session) = sessions.get_mut(&session_id) else {
            return;
        };

        match session.tick() {
            Tick::Running { .. } => {}
            Tick::Stopped => return,
            Tick::Expired => match finalize_session(&store, session).await {
                Ok((result_id, outcome)) => {
                    tracing::info!(
                        %session_id,
                        %result_id,
                        score = outcome.score,
                        "exam timer expired, attempt auto-submitted"
                    );
                    return;
                }
                Err(e) => {
                    // Session stays InProgress at zero remaining; the next
                    // tick lands here again.
                    tracing::error!(%session_id, "failed to persist auto-submit: {}", e);
                }
            },
        }
    }
}

fn owned_session<'a>(
    sessions: &'a mut std::collections::HashMap<Uuid, ExamSession>,
    session_id: &Uuid,
    claims: &Claims,
) -> Result<&'a mut ExamSession, AppError> {
    match sessions.get_mut(session_id) {
        Some(session) if session.user_id == claims.user_id() => Ok(session),
        _ => Err(AppError::NotFound("Exam session not found".to_string())),
    }
}

/// Starts an attempt at a test: snapshots the questions, arms the
/// countdown, and hands back answer-stripped questions.
#[utoipa::path(
    post,
    path = "/api/exams/start",
    request_body = StartExamRequest,
    responses(
        (status = 201, description = "Attempt started", body = StartExamResponse),
        (status = 404, description = "No such test"),
    )
)]
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let docs = state.store.list::<Test>(TESTS).await?;
    let doc = docs
        .into_iter()
        .find(|doc| doc.id == payload.test_id)
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if doc.data.questions.is_empty() {
        return Err(AppError::BadRequest("Test has no questions".to_string()));
    }

    let mut session = ExamSession::new(
        doc.id.clone(),
        claims.user_id(),
        claims.email.clone(),
        &doc.data,
    );
    session.start()?;

    let response = StartExamResponse {
        session_id: Uuid::new_v4(),
        test_id: doc.id,
        title: doc.data.title.clone(),
        duration: doc.data.duration,
        total_marks: doc.data.total_marks,
        remaining_secs: session.remaining_secs(),
        questions: doc.data.questions.iter().map(PublicQuestion::from).collect(),
    };

    state
        .exams
        .lock()
        .await
        .insert(response.session_id, session);

    tokio::spawn(run_exam_timer(
        state.exams.clone(),
        state.store.clone(),
        response.session_id,
    ));

    Ok((StatusCode::CREATED, Json(response)))
}

/// Current state of an attempt: countdown, cursor and answer slots.
#[utoipa::path(
    get,
    path = "/api/exams/{id}",
    responses(
        (status = 200, description = "Session status", body = ExamStatusResponse),
        (status = 404, description = "No such session"),
    )
)]
pub async fn exam_status(
    State(exams): State<ExamRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut sessions = exams.lock().await;
    let session = owned_session(&mut sessions, &id, &claims)?;

    Ok(Json(ExamStatusResponse {
        state: session.state().as_str(),
        remaining_secs: session.remaining_secs(),
        cursor: session.cursor(),
        answers: session.answers_wire(),
        question_count: session.questions().len(),
    }))
}

/// Records an answer: overwrites the slot for the given question.
#[utoipa::path(
    post,
    path = "/api/exams/{id}/answers",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Slot updated", body = ExamStatusResponse),
        (status = 409, description = "Attempt no longer in progress"),
    )
)]
pub async fn select_answer(
    State(exams): State<ExamRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut sessions = exams.lock().await;
    let session = owned_session(&mut sessions, &id, &claims)?;

    session.select_answer(payload.question, payload.option)?;

    Ok(Json(ExamStatusResponse {
        state: session.state().as_str(),
        remaining_secs: session.remaining_secs(),
        cursor: session.cursor(),
        answers: session.answers_wire(),
        question_count: session.questions().len(),
    }))
}

/// Moves the question cursor. Clamped at both ends; answers are untouched.
#[utoipa::path(
    post,
    path = "/api/exams/{id}/navigate",
    request_body = NavigateRequest,
    responses((status = 200, description = "Cursor moved", body = CurrentQuestionResponse))
)]
pub async fn navigate(
    State(exams): State<ExamRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut sessions = exams.lock().await;
    let session = owned_session(&mut sessions, &id, &claims)?;

    match payload.direction {
        Direction::Next => session.advance(),
        Direction::Prev => session.retreat(),
    }

    let cursor = session.cursor();
    let question = &session.questions()[cursor];

    Ok(Json(CurrentQuestionResponse {
        cursor,
        question_count: session.questions().len(),
        question: PublicQuestion::from(question),
    }))
}

/// Submits the attempt: grades it, persists the TestResult, and returns the
/// full review. A second submit (user or timer, whichever lost the race)
/// lands on a Submitted session and gets a 409.
#[utoipa::path(
    post,
    path = "/api/exams/{id}/submit",
    responses(
        (status = 201, description = "Result persisted", body = ExamResultResponse),
        (status = 409, description = "Already submitted"),
    )
)]
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut sessions = state.exams.lock().await;
    let session = owned_session(&mut sessions, &id, &claims)?;

    let (result_id, outcome) = finalize_session(&state.store, session).await?;

    let response = ExamResultResponse {
        result_id: Some(result_id),
        test_id: session.test_id.clone(),
        score: outcome.score,
        total_marks: session.total_marks(),
        correct_answers: outcome.correct_answers,
        total_questions: outcome.total_questions,
        time_taken: outcome.time_taken,
        review: build_review(session.questions(), &outcome.answers),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Post-submit review of a still-registered session: the graded outcome
/// plus every question with its correct answer and explanation.
#[utoipa::path(
    get,
    path = "/api/exams/{id}/review",
    responses(
        (status = 200, description = "Graded review", body = ExamResultResponse),
        (status = 409, description = "Not submitted yet"),
    )
)]
pub async fn review_exam(
    State(exams): State<ExamRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut sessions = exams.lock().await;
    let session = owned_session(&mut sessions, &id, &claims)?;

    let outcome = session
        .outcome()
        .ok_or(AppError::Conflict("Exam has not been submitted yet".to_string()))?
        .clone();

    Ok(Json(ExamResultResponse {
        result_id: None,
        test_id: session.test_id.clone(),
        score: outcome.score,
        total_marks: session.total_marks(),
        correct_answers: outcome.correct_answers,
        total_questions: outcome.total_questions,
        time_taken: outcome.time_taken,
        review: build_review(session.questions(), &outcome.answers),
    }))
}

/// Lists the caller's past results, newest first, joined in memory against
/// the tests collection. A deleted test degrades to "Unknown Test".
#[utoipa::path(
    get,
    path = "/api/results",
    responses((status = 200, description = "Own results", body = [ResultSummary]))
)]
pub async fn list_my_results(
    State(store): State<DocStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let results = store.list::<TestResult>(TEST_RESULTS).await?;
    let tests = store.list::<Test>(TESTS).await?;

    let mut summaries: Vec<ResultSummary> = results
        .into_iter()
        .filter(|doc| doc.data.user_id == user_id)
        .map(|doc| {
            let test = tests.iter().find(|t| t.id == doc.data.test_id);
            ResultSummary {
                id: doc.id,
                test_id: doc.data.test_id,
                test_title: test
                    .map(|t| t.data.title.clone())
                    .unwrap_or_else(|| "Unknown Test".to_string()),
                test_subject: test
                    .map(|t| t.data.subject.clone())
                    .unwrap_or_else(|| "Unknown Subject".to_string()),
                score: doc.data.score,
                total_marks: test.map(|t| t.data.total_marks),
                correct_answers: doc.data.correct_answers,
                total_questions: doc.data.total_questions,
                time_taken: doc.data.time_taken,
                submitted_at: doc.data.submitted_at,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

    Ok(Json(summaries))
}
