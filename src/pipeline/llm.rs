//! Model interaction: one `generateContent` call per submission.
//!
//! The request carries the rendered prompt plus the fixed generation and
//! safety settings from [`GraderConfig`]. The response is classified into a
//! [`GradingOutcome`]: either evaluation text, or an explicit safety block
//! with the feedback Gemini attached. Transport and API failures are
//! [`GradingError`]s. Nothing is retried.
//!
//! Gemini signals a safety block in two ways:
//!
//! * the prompt itself is blocked: no candidates, and
//!   `promptFeedback.blockReason` is set;
//! * the answer is blocked: a candidate with `finishReason: "SAFETY"` (or
//!   another policy reason) and no text parts.
//!
//! Both become [`GradingOutcome::SafetyBlocked`].

use crate::config::{GenerationSettings, GraderConfig, SafetySetting};
use crate::error::GradingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Finish reasons that mean the candidate was withheld by policy.
const SAFETY_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Result of a completed model call.
#[derive(Debug, Clone, PartialEq)]
pub enum GradingOutcome {
    /// The model's evaluation text, unparsed.
    Evaluation(String),
    /// Generation was withheld by the safety filters.
    SafetyBlocked(SafetyFeedback),
}

/// Why a response was blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SafetyFeedback {
    /// `promptFeedback.blockReason` or the candidate's finish reason.
    pub block_reason: Option<String>,
    /// Optional human-readable explanation from the service.
    pub message: Option<String>,
    pub safety_ratings: Vec<SafetyRating>,
}

impl fmt::Display for SafetyFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block_reason: {}",
            self.block_reason.as_deref().unwrap_or("UNSPECIFIED")
        )?;
        if let Some(ref msg) = self.message {
            write!(f, " ({msg})")?;
        }
        if !self.safety_ratings.is_empty() {
            f.write_str("; safety_ratings: [")?;
            for (i, r) in self.safety_ratings.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", r.category, r.probability)?;
                if r.blocked {
                    f.write_str(" (blocked)")?;
                }
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// Sends a prompt to a hosted model.
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, prompt: &str) -> Result<GradingOutcome, GradingError>;
}

// ── Gemini wire format ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: &'a GenerationSettings,
    safety_settings: &'a [SafetySetting],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// `generateContent` response body. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    pub block_reason_message: Option<String>,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ── Classification ───────────────────────────────────────────────────────

/// Classify a decoded `generateContent` response.
pub fn interpret_response(response: GenerateContentResponse) -> Result<GradingOutcome, GradingError> {
    if let Some(feedback) = response.prompt_feedback {
        if feedback.block_reason.is_some() {
            return Ok(GradingOutcome::SafetyBlocked(SafetyFeedback {
                block_reason: feedback.block_reason,
                message: feedback.block_reason_message,
                safety_ratings: feedback.safety_ratings,
            }));
        }
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GradingError::MalformedResponse("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(GradingOutcome::Evaluation(text));
    }

    match candidate.finish_reason.as_deref() {
        Some(reason) if SAFETY_FINISH_REASONS.contains(&reason) => {
            Ok(GradingOutcome::SafetyBlocked(SafetyFeedback {
                block_reason: Some(reason.to_string()),
                message: None,
                safety_ratings: candidate.safety_ratings,
            }))
        }
        reason => Err(GradingError::MalformedResponse(format!(
            "candidate has no text (finish reason: {})",
            reason.unwrap_or("none")
        ))),
    }
}

/// Map a non-success HTTP status and body to a [`GradingError`].
pub fn classify_http_error(status: u16, body: &str) -> GradingError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| match (env.error.status, env.error.message) {
            (Some(s), Some(m)) => Some(format!("{s}: {m}")),
            (None, Some(m)) => Some(m),
            (Some(s), None) => Some(s),
            (None, None) => None,
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => GradingError::Auth { detail: message },
        429 => GradingError::RateLimited { detail: message },
        _ => GradingError::Api { status, message },
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// [`Grader`] that calls the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    generation: GenerationSettings,
    safety_settings: Vec<SafetySetting>,
    timeout_secs: Option<u64>,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from the startup configuration.
    pub fn new(config: &GraderConfig) -> Result<Self, GradingError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| GradingError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: config.generate_content_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            generation: config.generation,
            safety_settings: config.safety_settings.clone(),
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: &self.generation,
            safety_settings: &self.safety_settings,
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GradingError {
        if e.is_timeout() {
            GradingError::Timeout {
                secs: self.timeout_secs.unwrap_or_default(),
            }
        } else {
            GradingError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Grader for GeminiClient {
    async fn grade(&self, prompt: &str) -> Result<GradingOutcome, GradingError> {
        let start = Instant::now();
        info!("Sending grading request to {} ({} prompt chars)", self.model, prompt.len());

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let err = classify_http_error(status.as_u16(), &body);
            warn!("Model call failed after {}ms: {}", start.elapsed().as_millis(), err);
            return Err(err);
        }

        let decoded: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GradingError::MalformedResponse(format!("invalid JSON: {e}")))?;

        if let Some(ref usage) = decoded.usage_metadata {
            debug!(
                "{} input tokens, {} output tokens",
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0)
            );
        }

        let outcome = interpret_response(decoded)?;
        match &outcome {
            GradingOutcome::Evaluation(text) => info!(
                "Response received: {} chars in {}ms",
                text.len(),
                start.elapsed().as_millis()
            ),
            GradingOutcome::SafetyBlocked(feedback) => {
                warn!("Response blocked by safety filters: {}", feedback)
            }
        }
        Ok(outcome)
    }
}
