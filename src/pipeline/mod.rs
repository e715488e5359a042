//! Pipeline stages for grading a scanned answer sheet.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and swapped (e.g. a different OCR engine) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ extract ──▶ prompts ──▶ llm
//! (%PDF)   (pdfium)  (tesseract) (page markers)      (Gemini)
//! ```
//!
//! 1. [`input`]: reject uploads that are not PDFs before pdfium sees them
//! 2. [`render`]: rasterise every page at the configured DPI
//! 3. [`ocr`]: recognise the text of one page image
//! 4. [`extract`]: drive render + OCR on the blocking pool and assemble the
//!    annotated page text
//! 5. [`llm`]: the single outbound `generateContent` call; the only
//!    stage with network I/O

pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod render;
