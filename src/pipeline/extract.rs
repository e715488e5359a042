//! Text extraction: PDF bytes → per-page OCR text with page markers.
//!
//! Rasterisation and OCR are CPU-bound and call into blocking native code,
//! so the whole stage runs inside `tokio::task::spawn_blocking`. Pages are
//! rendered and recognised one at a time; the first failure aborts the
//! document and nothing partial is returned.

use super::input::validate_pdf_bytes;
use super::ocr::OcrEngine;
use super::render::{PageImage, PageRasteriser};
use crate::error::ExtractionError;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Recognised text of a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub page_num: usize,
    pub text: String,
}

/// OCR output for a whole document, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub pages: Vec<PageText>,
}

impl ExtractedText {
    /// Header line written before each page's text.
    pub fn page_header(page_num: usize) -> String {
        format!("\n--- Page {} ---\n", page_num)
    }

    /// Flatten into the annotated form embedded in the grading prompt.
    ///
    /// Every page contributes `"\n--- Page N ---\n" + text + "\n"`, even when
    /// its text is empty.
    pub fn annotated(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&Self::page_header(page.page_num));
            out.push_str(&page.text);
            out.push('\n');
        }
        out
    }

    /// `true` when no page produced any non-whitespace character.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.annotated())
    }
}

/// Runs a [`PageRasteriser`] and an [`OcrEngine`] over an uploaded PDF.
#[derive(Clone)]
pub struct TextExtractor {
    rasteriser: Arc<dyn PageRasteriser>,
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(rasteriser: Arc<dyn PageRasteriser>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { rasteriser, ocr }
    }

    /// Extract the text of every page of `pdf`.
    pub async fn extract(&self, pdf: Vec<u8>) -> Result<ExtractedText, ExtractionError> {
        validate_pdf_bytes(&pdf)?;

        let rasteriser = Arc::clone(&self.rasteriser);
        let ocr = Arc::clone(&self.ocr);

        tokio::task::spawn_blocking(move || extract_blocking(rasteriser.as_ref(), ocr.as_ref(), &pdf))
            .await
            .map_err(|e| ExtractionError::TaskAborted(e.to_string()))?
    }
}

/// Blocking implementation of [`TextExtractor::extract`].
pub fn extract_blocking(
    rasteriser: &dyn PageRasteriser,
    ocr: &dyn OcrEngine,
    pdf: &[u8],
) -> Result<ExtractedText, ExtractionError> {
    let start = Instant::now();
    let mut pages = Vec::new();

    let total = rasteriser.render_each(pdf, &mut |page: PageImage| {
        let text = ocr.recognize(&page)?;
        debug!("Page {}: {} chars recognised", page.page_num, text.trim().len());
        pages.push(PageText {
            page_num: page.page_num,
            text,
        });
        Ok(())
    })?;

    info!(
        "Extracted text from {} pages in {}ms",
        total,
        start.elapsed().as_millis()
    );

    Ok(ExtractedText { pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::PageVisitor;
    use image::{DynamicImage, RgbaImage};
    use std::sync::Mutex;

    /// Emits `pages` blank 1×1 images.
    struct FakeRasteriser {
        pages: usize,
        fail_on: Option<usize>,
    }

    impl PageRasteriser for FakeRasteriser {
        fn render_each(
            &self,
            _pdf: &[u8],
            visit: &mut PageVisitor<'_>,
        ) -> Result<usize, ExtractionError> {
            for page_num in 1..=self.pages {
                if self.fail_on == Some(page_num) {
                    return Err(ExtractionError::RasterisationFailed {
                        page: page_num,
                        detail: "boom".into(),
                    });
                }
                visit(PageImage {
                    page_num,
                    image: DynamicImage::ImageRgba8(RgbaImage::new(1, 1)),
                    dpi: 300,
                })?;
            }
            Ok(self.pages)
        }
    }

    /// Returns canned text per page and records call order.
    struct FakeOcr {
        texts: Vec<&'static str>,
        fail_on: Option<usize>,
        seen: Mutex<Vec<usize>>,
    }

    impl FakeOcr {
        fn new(texts: Vec<&'static str>) -> Self {
            Self {
                texts,
                fail_on: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, page: &PageImage) -> Result<String, ExtractionError> {
            self.seen.lock().unwrap().push(page.page_num);
            if self.fail_on == Some(page.page_num) {
                return Err(ExtractionError::OcrFailed {
                    page: page.page_num,
                    detail: "unreadable".into(),
                });
            }
            Ok(self.texts[page.page_num - 1].to_string())
        }
    }

    const PDF: &[u8] = b"%PDF-1.4\n";

    #[test]
    fn annotates_every_page_in_order() {
        let ocr = FakeOcr::new(vec!["first", "", "third"]);
        let raster = FakeRasteriser { pages: 3, fail_on: None };
        let out = extract_blocking(&raster, &ocr, PDF).unwrap();

        assert_eq!(out.page_count(), 3);
        assert_eq!(
            out.annotated(),
            "\n--- Page 1 ---\nfirst\n\n--- Page 2 ---\n\n\n--- Page 3 ---\nthird\n"
        );

        let text = out.annotated();
        let positions: Vec<usize> = (1..=3)
            .map(|n| text.find(&format!("--- Page {n} ---")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(text.matches("--- Page ").count(), 3);
        assert_eq!(*ocr.seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn ocr_failure_discards_partial_result() {
        let mut ocr = FakeOcr::new(vec!["a", "b", "c"]);
        ocr.fail_on = Some(2);
        let raster = FakeRasteriser { pages: 3, fail_on: None };
        let err = extract_blocking(&raster, &ocr, PDF).unwrap_err();
        assert!(matches!(err, ExtractionError::OcrFailed { page: 2, .. }));
        // Page 3 is never attempted.
        assert_eq!(*ocr.seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn render_failure_is_propagated() {
        let ocr = FakeOcr::new(vec!["a", "b"]);
        let raster = FakeRasteriser { pages: 2, fail_on: Some(2) };
        let err = extract_blocking(&raster, &ocr, PDF).unwrap_err();
        assert!(matches!(err, ExtractionError::RasterisationFailed { page: 2, .. }));
    }

    #[test]
    fn blank_detection_ignores_headers() {
        let blank = ExtractedText {
            pages: vec![
                PageText { page_num: 1, text: "  \n\t".into() },
                PageText { page_num: 2, text: String::new() },
            ],
        };
        assert!(blank.is_blank());
        // The annotated form is never empty, which is why blankness is
        // judged on page text.
        assert!(!blank.annotated().trim().is_empty());

        let not_blank = ExtractedText {
            pages: vec![PageText { page_num: 1, text: " x ".into() }],
        };
        assert!(!not_blank.is_blank());
    }

    #[test]
    fn zero_page_document_is_blank() {
        assert!(ExtractedText::default().is_blank());
        assert_eq!(ExtractedText::default().annotated(), "");
    }

    #[tokio::test]
    async fn extractor_rejects_non_pdf_before_rendering() {
        let ocr = Arc::new(FakeOcr::new(vec![]));
        let extractor = TextExtractor::new(
            Arc::new(FakeRasteriser { pages: 1, fail_on: None }),
            ocr.clone(),
        );
        let err = extractor.extract(b"GIF89a....".to_vec()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NotAPdf { .. }));
        assert!(ocr.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extractor_runs_on_blocking_pool() {
        let extractor = TextExtractor::new(
            Arc::new(FakeRasteriser { pages: 2, fail_on: None }),
            Arc::new(FakeOcr::new(vec!["Question 1: ...", "Question 2: ..."])),
        );
        let out = extractor.extract(PDF.to_vec()).await.unwrap();
        assert_eq!(out.pages[0].text, "Question 1: ...");
        assert_eq!(out.pages[1].page_num, 2);
    }
}
