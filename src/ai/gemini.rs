// src/ai/gemini.rs

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;

use super::{
    AiError, Difficulty, GenAi, GeneratedQuestion, PaperAnalysis, extract_json_array,
    extract_json_object, parse_paper, parse_questions,
};

const MCQ_PROMPT: &str = r#"Generate {count} multiple choice questions for {subject} on the topic of {topic}.
Difficulty level: {difficulty}

For each question, provide:
1. A clear, well-formulated question
2. Four options (A, B, C, D)
3. The correct answer (0-3, where 0=A, 1=B, 2=C, 3=D)
4. A brief explanation of why the answer is correct

Format the response as a JSON array with this structure:
[
  {
    "question": "Question text here?",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correctAnswer": 0,
    "explanation": "Explanation here"
  }
]

Make sure the questions are relevant, accurate, and appropriate for engineering students."#;

const OCR_PROMPT: &str = r#"This image contains handwritten notes. Please:
1. Transcribe all handwritten text accurately
2. Preserve the structure and formatting
3. Convert mathematical symbols and equations properly
4. Organize the content in a logical manner
5. If there are diagrams or drawings, describe them

Return the transcribed text in a clean, structured format."#;

const PAPER_PROMPT: &str = r#"Analyze this question paper image and extract:
1. The title of the test/exam
2. The subject
3. Total marks
4. All questions with their options and correct answers

Format the response as JSON:
{
  "title": "Test Title",
  "subject": "Subject Name",
  "totalMarks": 100,
  "questions": [
    {
      "question": "Question text",
      "options": ["A", "B", "C", "D"],
      "correctAnswer": 0,
      "explanation": "Why this is correct"
    }
  ]
}"#;

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: Url, model: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            model,
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gemini_base_url.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone(),
        )
    }

    /// One call, one reply. Fails before any network I/O when no key is
    /// configured; otherwise propagates transport and status failures as-is.
    async fn generate_content(&self, parts: Vec<Part>) -> Result<String, AiError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AiError::MissingApiKey)?;

        let url = format!(
            "{}/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", key)])
            .json(&request)
            .send()
            .await
            .map_err(AiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status(status.as_u16(), body));
        }

        let body: GenerateContentResponse = response.json().await.map_err(AiError::Transport)?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(AiError::EmptyReply)
    }
}

#[async_trait::async_trait]
impl GenAi for GeminiClient {
    async fn generate_questions(
        &self,
        subject: &str,
        topic: &str,
        difficulty: Difficulty,
        count: u8,
    ) -> Result<Vec<GeneratedQuestion>, AiError> {
        let prompt = MCQ_PROMPT
            .replace("{count}", &count.to_string())
            .replace("{subject}", subject)
            .replace("{topic}", topic)
            .replace("{difficulty}", &difficulty.to_string());

        let reply = self.generate_content(vec![Part::text(prompt)]).await?;
        tracing::debug!(chars = reply.len(), "Gemini MCQ reply received");

        parse_questions(extract_json_array(&reply)?)
    }

    async fn transcribe_notes(
        &self,
        mime_type: &str,
        base64_data: &str,
    ) -> Result<String, AiError> {
        let reply = self
            .generate_content(vec![
                Part::text(OCR_PROMPT.to_string()),
                Part::inline(mime_type, base64_data),
            ])
            .await?;

        Ok(reply.trim().to_string())
    }

    async fn analyze_question_paper(
        &self,
        mime_type: &str,
        base64_data: &str,
    ) -> Result<PaperAnalysis, AiError> {
        let reply = self
            .generate_content(vec![
                Part::text(PAPER_PROMPT.to_string()),
                Part::inline(mime_type, base64_data),
            ])
            .await?;

        parse_paper(extract_json_object(&reply)?)
    }
}

// Wire types for the generateContent endpoint. Field names follow the REST
// API's snake_case request convention.

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, data: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}
