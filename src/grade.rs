//! Grading entry points: one submission in, one evaluation out.
//!
//! [`GradingPipeline`] sequences the stages for a single request:
//!
//! ```text
//! validate ─▶ extract (pdfium + tesseract) ─▶ prompt ─▶ model ─▶ Evaluation
//! ```
//!
//! Every failure is terminal; the pipeline never retries. The HTTP layer in
//! [`crate::server`] and the CLI both call [`GradingPipeline::grade`].

use crate::config::GraderConfig;
use crate::error::{GradeError, GradingError, InputError};
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::{GeminiClient, Grader, GradingOutcome};
use crate::pipeline::ocr::TesseractEngine;
use crate::pipeline::render::PdfiumRasteriser;
use crate::prompts::build_grading_prompt;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A rubric and the answer sheet to grade against it.
#[derive(Debug, Clone)]
pub struct Submission {
    pub rubric: String,
    pub answer_pdf: Vec<u8>,
}

impl Submission {
    pub fn new(rubric: impl Into<String>, answer_pdf: impl Into<Vec<u8>>) -> Self {
        Self {
            rubric: rubric.into(),
            answer_pdf: answer_pdf.into(),
        }
    }

    /// Read the answer sheet and rubric from local files.
    pub async fn from_files(pdf: &Path, rubric: &Path) -> std::io::Result<Self> {
        let answer_pdf = tokio::fs::read(pdf).await?;
        let rubric = tokio::fs::read_to_string(rubric).await?;
        Ok(Self { rubric, answer_pdf })
    }
}

/// The model's evaluation, returned unparsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub evaluation: String,
}

/// Extractor + grader pair shared by every request.
#[derive(Clone)]
pub struct GradingPipeline {
    extractor: TextExtractor,
    grader: Arc<dyn Grader>,
}

impl GradingPipeline {
    pub fn new(extractor: TextExtractor, grader: Arc<dyn Grader>) -> Self {
        Self { extractor, grader }
    }

    /// Production pipeline: pdfium rasteriser, tesseract OCR, Gemini client.
    ///
    /// Binds pdfium (downloading it on first use), so call this once at
    /// startup.
    pub fn from_config(config: &GraderConfig) -> Result<Self, GradeError> {
        let rasteriser = PdfiumRasteriser::bind(config)
            .map_err(|e| GradeError::Internal(format!("Failed to bind pdfium: {e}")))?;
        let ocr = TesseractEngine::from_config(config);
        let extractor = TextExtractor::new(Arc::new(rasteriser), Arc::new(ocr));
        let grader = GeminiClient::new(config)?;
        Ok(Self::new(extractor, Arc::new(grader)))
    }

    /// Grade one submission.
    pub async fn grade(&self, submission: Submission) -> Result<Evaluation, GradeError> {
        let start = Instant::now();
        let Submission { rubric, answer_pdf } = submission;

        // ── Step 1: Validate ─────────────────────────────────────────────
        // An empty upload is not special-cased: it fails the %PDF check in
        // extraction like any other non-PDF stream.
        if rubric.is_empty() {
            return Err(InputError::MissingRubric.into());
        }

        // ── Step 2: Extract ──────────────────────────────────────────────
        info!("Starting PDF text extraction ({} bytes)", answer_pdf.len());
        let extracted = self.extractor.extract(answer_pdf).await?;
        if extracted.is_blank() {
            warn!(
                "No text detected across {} pages",
                extracted.page_count()
            );
            return Err(InputError::NoTextDetected.into());
        }
        info!("Extraction complete: {} pages", extracted.page_count());

        // ── Step 3: Build prompt ─────────────────────────────────────────
        let prompt = build_grading_prompt(&rubric, &extracted.annotated());

        // ── Step 4: Call the model ───────────────────────────────────────
        let evaluation = match self.grader.grade(&prompt).await? {
            GradingOutcome::Evaluation(text) => text,
            GradingOutcome::SafetyBlocked(feedback) => {
                return Err(GradingError::ContentBlocked {
                    feedback: feedback.to_string(),
                }
                .into());
            }
        };

        info!("Grading complete in {}ms", start.elapsed().as_millis());
        Ok(Evaluation { evaluation })
    }
}
