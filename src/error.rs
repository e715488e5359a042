//! Error types for the edgequake-grade library.
//!
//! A grading request fails in exactly one of three places, and each has its
//! own error type:
//!
//! * [`InputError`]: the caller sent something we cannot grade (no file,
//!   no rubric, a scan with no recognisable text). Maps to HTTP 400
//!   (413 for an upload over the size limit).
//! * [`ExtractionError`]: the PDF could not be opened, rasterised or OCR'd.
//!   Maps to HTTP 500.
//! * [`GradingError`]: the model call failed or the model refused to answer
//!   because of its safety filters. Maps to HTTP 500.
//!
//! [`GradeError`] wraps all three (plus an unclassified `Internal` bucket) and
//! is the only type the request boundary deals with; [`GradeError::status_code`]
//! is the single place where failures become status codes.
//!
//! [`ConfigError`] is separate: it only happens at startup, before any
//! request is served.

use axum::http::StatusCode;
use thiserror::Error;

/// Client-side problems with a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// The `student_answer_pdf` field was absent.
    #[error("No PDF file provided.")]
    MissingFile,

    /// The `rubric` field was absent or empty.
    #[error("Rubric is required.")]
    MissingRubric,

    /// Extraction succeeded but every page OCR'd to whitespace.
    #[error("OCR Failure: Could not detect any text in the PDF.")]
    NoTextDetected,

    /// The multipart body itself could not be read.
    #[error("Malformed upload: {0}")]
    Malformed(String),

    /// The request body exceeded the configured upload limit.
    #[error("Upload too large: {0}")]
    TooLarge(String),
}

/// Failures while turning PDF bytes into page text.
///
/// Extraction is all-or-nothing: any of these aborts the whole document and
/// no partial text is returned.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The upload is empty or does not start with the `%PDF` magic.
    #[error("Failed to process PDF: not a PDF document (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The pdfium library could not be loaded.
    #[error("Failed to process PDF: PDF engine unavailable: {detail}")]
    EngineUnavailable { detail: String },

    /// pdfium could not parse the document.
    #[error("Failed to process PDF: document is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium could not render a page.
    #[error("Failed to process PDF: rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be written out for the OCR engine.
    #[error("Failed to process PDF: could not encode page {page}: {detail}")]
    ImageEncodingFailed { page: usize, detail: String },

    /// The OCR engine failed on a page.
    #[error("Failed to process PDF: OCR failed for page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The OCR engine binary could not be started at all.
    #[error("Failed to process PDF: OCR engine '{command}' could not be started: {source}")]
    OcrUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The blocking extraction task panicked or was cancelled.
    #[error("Failed to process PDF: extraction task aborted: {0}")]
    TaskAborted(String),
}

/// Failures of the outbound model call.
#[derive(Debug, Error)]
pub enum GradingError {
    /// The model withheld its output because of the configured safety
    /// thresholds. `feedback` carries the block reason and safety ratings.
    #[error("Content blocked by safety settings: {feedback}")]
    ContentBlocked { feedback: String },

    /// The API rejected the credential (HTTP 401/403).
    #[error("Authentication error from model service: {detail}")]
    Auth { detail: String },

    /// Quota or rate limit exhausted (HTTP 429).
    #[error("Rate limit exceeded for model service: {detail}")]
    RateLimited { detail: String },

    /// The configured client timeout elapsed.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Any other non-success HTTP status.
    #[error("Model API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response could not be interpreted as an evaluation.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Connection-level failure.
    #[error("Model request failed: {0}")]
    Transport(String),
}

/// Everything that can end a grading request.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Grading(#[from] GradingError),

    /// Unclassified failure caught at the boundary.
    #[error("{0}")]
    Internal(String),
}

impl GradeError {
    /// HTTP status code for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GradeError::Input(InputError::TooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
            GradeError::Input(_) => StatusCode::BAD_REQUEST,
            GradeError::Extraction(_) | GradeError::Grading(_) | GradeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// `true` when the model refused to answer due to safety filtering.
    pub fn is_content_blocked(&self) -> bool {
        matches!(
            self,
            GradeError::Grading(GradingError::ContentBlocked { .. })
        )
    }
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `GEMINI_API_KEY` is unset or blank.
    #[error("GEMINI_API_KEY not found. Set it in the environment or in a .env file.")]
    MissingApiKey,

    /// An environment variable held an unparsable value.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
