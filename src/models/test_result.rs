// src/models/test_result.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One scored attempt, stored as a document in the `testResults` collection.
/// Created exactly once per completed attempt; immutable afterward.
///
/// Invariants: `answers.len() == total_questions` (the referenced test's
/// question count at the time the attempt started), and
/// `score == round2(correct_answers / total_questions * total_marks)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_id: String,
    pub user_id: i64,
    pub user_email: String,
    /// One entry per question; -1 marks an unanswered slot.
    pub answers: Vec<i32>,
    pub score: f64,
    pub total_questions: usize,
    pub correct_answers: usize,
    /// Minutes.
    pub time_taken: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Listing DTO for the caller's past attempts, joined in memory against the
/// `tests` collection. A result whose test has since been deleted keeps its
/// numbers and degrades to the "Unknown Test" labels.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub id: String,
    pub test_id: String,
    pub test_title: String,
    pub test_subject: String,
    pub score: f64,
    pub total_marks: Option<f64>,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub time_taken: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}
