//! # edgequake-grade
//!
//! Grade scanned, handwritten answer sheets against a free-text rubric.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload (PDF + rubric)
//!  │
//!  ├─ 1. Validate  file present, rubric non-empty, bytes start with %PDF
//!  ├─ 2. Render    rasterise pages via pdfium at 300 DPI (spawn_blocking)
//!  ├─ 3. OCR       tesseract per page, "--- Page N ---" markers
//!  ├─ 4. Prompt    fixed grading instructions + rubric + answer text
//!  └─ 5. Grade     one Gemini generateContent call → evaluation text
//! ```
//!
//! Every stage fails the whole request; nothing is retried and no partial
//! evaluation is ever returned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_grade::{GraderConfig, GradingPipeline, Submission};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GraderConfig::from_env()?; // needs GEMINI_API_KEY
//!     let pipeline = GradingPipeline::from_config(&config)?;
//!
//!     let pdf = std::fs::read("answers.pdf")?;
//!     let rubric = "Q1 (5 pts): mentions photosynthesis.";
//!     let result = pipeline.grade(Submission::new(rubric, pdf)).await?;
//!     println!("{}", result.evaluation);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `edgequake-grade` binary (clap + anyhow + dotenvy + tracing-subscriber) |
//!
//! ## Runtime Requirements
//!
//! - `tesseract` on `PATH` (or `TESSERACT_CMD`) with the configured language
//!   data installed.
//! - pdfium: downloaded and cached on first use by `pdfium-auto`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod grade;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GenerationSettings, GraderConfig, GraderConfigBuilder, HarmBlockThreshold, HarmCategory,
    SafetySetting,
};
pub use error::{ConfigError, ExtractionError, GradeError, GradingError, InputError};
pub use grade::{Evaluation, GradingPipeline, Submission};
pub use pipeline::extract::{ExtractedText, PageText, TextExtractor};
pub use pipeline::llm::{GeminiClient, Grader, GradingOutcome, SafetyFeedback};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::render::{PageImage, PageRasteriser, PdfiumRasteriser};
pub use server::{router, serve, AppState};
