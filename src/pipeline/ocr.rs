//! OCR: recognise the text on one rendered page.
//!
//! The production engine shells out to the `tesseract` CLI, which must be on
//! `PATH` (or named by `TESSERACT_CMD`) with the language data installed.

use super::render::PageImage;
use crate::config::GraderConfig;
use crate::error::ExtractionError;
use std::process::Command;
use tracing::debug;

/// Recognises text in a page image. Blocking.
pub trait OcrEngine: Send + Sync {
    /// Return the recognised text of `page` (possibly empty).
    fn recognize(&self, page: &PageImage) -> Result<String, ExtractionError>;
}

/// [`OcrEngine`] that runs the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    /// Engine configured from `tesseract_cmd` and `ocr_language`.
    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(&config.tesseract_cmd, &config.ocr_language)
    }

    /// Arguments after the input path: write to stdout, fixed language and
    /// the resolution the page was actually rendered at.
    fn args(&self, page: &PageImage) -> Vec<String> {
        vec![
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--dpi".to_string(),
            page.dpi.to_string(),
        ]
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, page: &PageImage) -> Result<String, ExtractionError> {
        let page_num = page.page_num;

        let input = tempfile::Builder::new()
            .prefix("grade-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ExtractionError::ImageEncodingFailed {
                page: page_num,
                detail: format!("tempfile: {e}"),
            })?;

        page.image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| ExtractionError::ImageEncodingFailed {
                page: page_num,
                detail: e.to_string(),
            })?;

        let output = Command::new(&self.command)
            .arg(input.path())
            .args(self.args(page))
            .output()
            .map_err(|source| ExtractionError::OcrUnavailable {
                command: self.command.clone(),
                source,
            })?;

        // `input` is dropped (and the PNG deleted) at the end of this scope.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrFailed {
                page: page_num,
                detail: format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR page {}: {} chars", page_num, text.len());
        Ok(text)
    }
}
