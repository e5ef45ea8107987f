// src/exam.rs
//
// The test-taking state machine. One `ExamSession` per in-flight attempt,
// owned by the `ExamRegistry` and driven from two sides: the HTTP handlers
// and a per-session one-second timer task. All transitions happen under the
// registry lock, so the timer-forced submit and a user-initiated submit
// serialize and exactly one of them produces a TestResult.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::test::{Question, Test};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamState {
    NotStarted,
    InProgress,
    Submitted,
}

impl ExamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamState::NotStarted => "notStarted",
            ExamState::InProgress => "inProgress",
            ExamState::Submitted => "submitted",
        }
    }
}

#[derive(Debug)]
pub enum ExamError {
    AlreadyStarted,
    NotInProgress,
    QuestionOutOfRange,
    OptionOutOfRange,
    NotSubmitted,
}

impl fmt::Display for ExamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ExamError::AlreadyStarted => "Exam has already been started",
            ExamError::NotInProgress => "Exam is not in progress",
            ExamError::QuestionOutOfRange => "Question index out of range",
            ExamError::OptionOutOfRange => "Answer option must be between 0 and 3",
            ExamError::NotSubmitted => "Exam has not been submitted yet",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for ExamError {}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::AlreadyStarted | ExamError::NotInProgress | ExamError::NotSubmitted => {
                AppError::Conflict(err.to_string())
            }
            ExamError::QuestionOutOfRange | ExamError::OptionOutOfRange => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

/// What a one-second tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still counting down.
    Running { remaining_secs: u32 },
    /// Time is up and the session is still in progress: the caller must
    /// force a submit. Repeats on every tick until the session leaves
    /// InProgress, so a failed forced persist gets retried.
    Expired,
    /// The session is no longer in progress; the timer can stop.
    Stopped,
}

/// The graded outcome of an attempt. Computed by `grade`, persisted by the
/// caller, then pinned to the session by `complete` for the review view.
#[derive(Debug, Clone)]
pub struct ExamOutcome {
    /// One entry per question; -1 marks an unanswered slot.
    pub answers: Vec<i32>,
    pub score: f64,
    pub correct_answers: usize,
    pub total_questions: usize,
    /// Minutes.
    pub time_taken: i64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug)]
pub struct ExamSession {
    pub test_id: String,
    pub user_id: i64,
    pub user_email: String,
    questions: Vec<Question>,
    duration_minutes: i64,
    total_marks: f64,
    answers: Vec<Option<usize>>,
    cursor: usize,
    remaining_secs: u32,
    state: ExamState,
    outcome: Option<ExamOutcome>,
}

impl ExamSession {
    /// Snapshots the test into a NotStarted session. The snapshot keeps the
    /// attempt coherent even if the test document later disappears.
    pub fn new(test_id: String, user_id: i64, user_email: String, test: &Test) -> Self {
        Self {
            test_id,
            user_id,
            user_email,
            questions: test.questions.clone(),
            duration_minutes: test.duration,
            total_marks: test.total_marks,
            answers: Vec::new(),
            cursor: 0,
            remaining_secs: 0,
            state: ExamState::NotStarted,
            outcome: None,
        }
    }

    /// NotStarted -> InProgress: all answer slots unset, full time budget.
    pub fn start(&mut self) -> Result<(), ExamError> {
        if self.state != ExamState::NotStarted {
            return Err(ExamError::AlreadyStarted);
        }
        self.answers = vec![None; self.questions.len()];
        self.cursor = 0;
        self.remaining_secs = (self.duration_minutes as u32) * 60;
        self.state = ExamState::InProgress;
        Ok(())
    }

    pub fn state(&self) -> ExamState {
        self.state
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn total_marks(&self) -> f64 {
        self.total_marks
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn outcome(&self) -> Option<&ExamOutcome> {
        self.outcome.as_ref()
    }

    /// Wire shape of the answer slots: -1 for unset.
    pub fn answers_wire(&self) -> Vec<i32> {
        self.answers
            .iter()
            .map(|a| a.map(|v| v as i32).unwrap_or(-1))
            .collect()
    }

    /// Overwrites one answer slot. No validation of any prior answer.
    pub fn select_answer(&mut self, question: usize, option: usize) -> Result<(), ExamError> {
        if self.state != ExamState::InProgress {
            return Err(ExamError::NotInProgress);
        }
        if question >= self.questions.len() {
            return Err(ExamError::QuestionOutOfRange);
        }
        if option > 3 {
            return Err(ExamError::OptionOutOfRange);
        }
        self.answers[question] = Some(option);
        Ok(())
    }

    /// Moves the cursor forward, clamped to the last question.
    pub fn advance(&mut self) {
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
        }
    }

    /// Moves the cursor back, clamped to the first question.
    pub fn retreat(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// One second elapses.
    pub fn tick(&mut self) -> Tick {
        if self.state != ExamState::InProgress {
            return Tick::Stopped;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            Tick::Expired
        } else {
            Tick::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    /// Scores the attempt by positional comparison against each question's
    /// correct index. Valid only while InProgress; does not transition.
    pub fn grade(&self) -> Result<ExamOutcome, ExamError> {
        if self.state != ExamState::InProgress {
            return Err(ExamError::NotInProgress);
        }

        let total_questions = self.questions.len();
        let correct_answers = self
            .answers
            .iter()
            .zip(self.questions.iter())
            .filter(|(answer, question)| **answer == Some(question.correct_answer))
            .count();

        let score = round2(correct_answers as f64 / total_questions as f64 * self.total_marks);
        let time_taken = self.duration_minutes - (self.remaining_secs / 60) as i64;

        Ok(ExamOutcome {
            answers: self.answers_wire(),
            score,
            correct_answers,
            total_questions,
            time_taken,
        })
    }

    /// InProgress -> Submitted. Called only after the TestResult persisted;
    /// a failed persist leaves the session InProgress on purpose.
    pub fn complete(&mut self, outcome: ExamOutcome) -> Result<(), ExamError> {
        if self.state != ExamState::InProgress {
            return Err(ExamError::NotInProgress);
        }
        self.state = ExamState::Submitted;
        self.outcome = Some(outcome);
        Ok(())
    }
}

/// All in-flight sessions, keyed by session id. Lives for the process
/// lifetime; attempts are deliberately not durable.
#[derive(Clone, Default)]
pub struct ExamRegistry {
    inner: Arc<Mutex<HashMap<Uuid, ExamSession>>>,
}

impl ExamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ExamSession>> {
        self.inner.lock().await
    }
}
