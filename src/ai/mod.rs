// src/ai/mod.rs
//
// The generative-AI façade: prompt formatting, one HTTP call, and strict
// parsing of the free-form reply. No retry, no backoff, no fallback; every
// failure surfaces to the caller as a single error.

pub mod gemini;

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

pub use gemini::GeminiClient;

#[derive(Debug)]
pub enum AiError {
    /// Refused before any network I/O: no API key configured.
    MissingApiKey,
    /// The HTTP call itself failed.
    Transport(reqwest::Error),
    /// The endpoint answered with a non-success status.
    Status(u16, String),
    /// The endpoint answered, but with no candidate text.
    EmptyReply,
    /// The reply contained no bracketed JSON payload.
    NoJsonPayload,
    /// The bracketed payload was not valid JSON.
    Parse(serde_json::Error),
    /// The payload parsed but failed shape validation.
    BadShape(String),
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiError::MissingApiKey => write!(f, "Gemini API key is not configured"),
            AiError::Transport(e) => write!(f, "Gemini request failed: {}", e),
            AiError::Status(code, body) => {
                write!(f, "Gemini returned HTTP {}: {}", code, body)
            }
            AiError::EmptyReply => write!(f, "Gemini returned an empty reply"),
            AiError::NoJsonPayload => write!(f, "Gemini reply contained no JSON payload"),
            AiError::Parse(e) => write!(f, "Gemini reply was not valid JSON: {}", e),
            AiError::BadShape(msg) => write!(f, "Gemini reply had an unusable shape: {}", msg),
        }
    }
}

impl std::error::Error for AiError {}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::MissingApiKey | AiError::Transport(_) | AiError::Status(..) => {
                AppError::UpstreamError(err.to_string())
            }
            AiError::EmptyReply
            | AiError::NoJsonPayload
            | AiError::Parse(_)
            | AiError::BadShape(_) => AppError::UnusableReply(err.to_string()),
        }
    }
}

/// Requested difficulty of generated questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        write!(f, "{}", s)
    }
}

/// A machine-generated MCQ, already range-checked. Deliberately the same
/// wire shape as an authored question, so the client can paste these
/// straight into a create-test request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Structured extraction of a photographed question paper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaperAnalysis {
    pub title: String,
    pub subject: String,
    pub total_marks: f64,
    pub questions: Vec<GeneratedQuestion>,
}

/// The three operations the portal delegates to a generative model.
#[async_trait]
pub trait GenAi: Send + Sync {
    async fn generate_questions(
        &self,
        subject: &str,
        topic: &str,
        difficulty: Difficulty,
        count: u8,
    ) -> Result<Vec<GeneratedQuestion>, AiError>;

    /// OCR transcription of handwritten notes; the reply is plain prose.
    async fn transcribe_notes(&self, mime_type: &str, base64_data: &str)
    -> Result<String, AiError>;

    async fn analyze_question_paper(
        &self,
        mime_type: &str,
        base64_data: &str,
    ) -> Result<PaperAnalysis, AiError>;
}

static JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Locates the first bracketed JSON array in a free-form reply. Models wrap
/// their JSON in prose and code fences more often than not.
pub fn extract_json_array(reply: &str) -> Result<&str, AiError> {
    JSON_ARRAY
        .find(reply)
        .map(|m| m.as_str())
        .ok_or(AiError::NoJsonPayload)
}

/// Locates the first bracketed JSON object in a free-form reply.
pub fn extract_json_object(reply: &str) -> Result<&str, AiError> {
    JSON_OBJECT
        .find(reply)
        .map(|m| m.as_str())
        .ok_or(AiError::NoJsonPayload)
}

/// Parses an extracted array into typed questions and range-checks each one.
pub fn parse_questions(payload: &str) -> Result<Vec<GeneratedQuestion>, AiError> {
    let questions: Vec<GeneratedQuestion> =
        serde_json::from_str(payload).map_err(AiError::Parse)?;
    if questions.is_empty() {
        return Err(AiError::BadShape("no questions in reply".to_string()));
    }
    for q in &questions {
        validate_question(q)?;
    }
    Ok(questions)
}

/// Parses an extracted object into a typed paper analysis.
pub fn parse_paper(payload: &str) -> Result<PaperAnalysis, AiError> {
    let paper: PaperAnalysis = serde_json::from_str(payload).map_err(AiError::Parse)?;
    if paper.total_marks <= 0.0 {
        return Err(AiError::BadShape("totalMarks must be positive".to_string()));
    }
    for q in &paper.questions {
        validate_question(q)?;
    }
    Ok(paper)
}

fn validate_question(q: &GeneratedQuestion) -> Result<(), AiError> {
    if q.question.trim().is_empty() {
        return Err(AiError::BadShape("empty question text".to_string()));
    }
    if q.options.len() != 4 {
        return Err(AiError::BadShape(format!(
            "expected 4 options, got {}",
            q.options.len()
        )));
    }
    if q.correct_answer > 3 {
        return Err(AiError::BadShape(format!(
            "correctAnswer {} out of range",
            q.correct_answer
        )));
    }
    Ok(())
}
