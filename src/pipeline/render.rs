//! PDF rasterisation: render each page of an uploaded PDF via pdfium.
//!
//! Pages are handed to a visitor one at a time rather than collected into a
//! `Vec`: a 300-DPI A4 page is ~35 MB of RGBA, so a long answer booklet
//! rendered up front would hold hundreds of megabytes. The pdfium binding and
//! the document handle live only for the duration of
//! [`PageRasteriser::render_each`] and are released when it returns, on
//! success and on error alike.
//!
//! Everything here is blocking; callers run it inside `spawn_blocking`
//! (see [`crate::pipeline::extract`]).

use crate::config::GraderConfig;
use crate::error::ExtractionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number in document order.
    pub page_num: usize,
    /// Rendered bitmap.
    pub image: DynamicImage,
    /// Resolution the bitmap actually has. Equals the configured DPI unless
    /// the per-edge pixel cap shrank an oversized page.
    pub dpi: u32,
}

/// Callback receiving each rendered page in order.
pub type PageVisitor<'v> = dyn FnMut(PageImage) -> Result<(), ExtractionError> + 'v;

/// Turns PDF bytes into page images.
///
/// Implementations must call `visit` once per page, in page order, and stop
/// at the first error (from rendering or from `visit`).
pub trait PageRasteriser: Send + Sync {
    /// Render every page of `pdf`, returning the page count.
    fn render_each(&self, pdf: &[u8], visit: &mut PageVisitor<'_>) -> Result<usize, ExtractionError>;
}

/// [`PageRasteriser`] backed by the pdfium shared library.
///
/// Holds only the library path; each document binds its own `Pdfium`
/// instance on the blocking thread that renders it.
#[derive(Debug, Clone)]
pub struct PdfiumRasteriser {
    library: PathBuf,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumRasteriser {
    /// Use the pdfium library at `library`.
    pub fn new(library: impl Into<PathBuf>, config: &GraderConfig) -> Self {
        Self {
            library: library.into(),
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
        }
    }

    /// Locate pdfium via `pdfium-auto` (downloading it on first use) and
    /// check that it binds.
    pub fn bind(config: &GraderConfig) -> Result<Self, pdfium_auto::PdfiumAutoError> {
        let library = pdfium_auto::ensure_pdfium_library(None)?;
        pdfium_auto::bind_pdfium_from_path(&library)?;
        debug!("pdfium bound from {}", library.display());
        Ok(Self::new(library, config))
    }

    fn render_config(&self) -> PdfRenderConfig {
        PdfRenderConfig::new()
            .scale_page_by_factor(scale_for_dpi(self.dpi))
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32)
    }
}

impl PageRasteriser for PdfiumRasteriser {
    fn render_each(&self, pdf: &[u8], visit: &mut PageVisitor<'_>) -> Result<usize, ExtractionError> {
        let pdfium = pdfium_auto::bind_pdfium_from_path(&self.library).map_err(|e| {
            ExtractionError::EngineUnavailable {
                detail: e.to_string(),
            }
        })?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| ExtractionError::CorruptPdf {
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages, rendering at {} DPI", total_pages, self.dpi);

        let render_config = self.render_config();

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ExtractionError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            let dpi = effective_dpi(image.width(), page.width().value, self.dpi);
            debug!(
                "Rendered page {} → {}x{} px at {} DPI",
                page_num,
                image.width(),
                image.height(),
                dpi
            );

            visit(PageImage {
                page_num,
                image,
                dpi,
            })?;
        }

        Ok(total_pages)
    }
}

/// pdfium renders at 72 points per inch; scale up to reach `dpi`.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

/// Resolution of a page rendered `rendered_px` wide from `page_points` wide.
///
/// Never above `requested`; falls back to it when the page width is unknown.
pub fn effective_dpi(rendered_px: u32, page_points: f32, requested: u32) -> u32 {
    if page_points <= 0.0 || rendered_px == 0 {
        return requested;
    }
    let dpi = (rendered_px as f32 * 72.0 / page_points).round() as u32;
    dpi.min(requested).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_relative_to_72_points_per_inch() {
        assert_eq!(scale_for_dpi(72), 1.0);
        assert!((scale_for_dpi(300) - 4.1667).abs() < 1e-3);
    }

    #[test]
    fn effective_dpi_matches_request_for_normal_pages() {
        // A4 width at 300 DPI.
        let px = (595.0 * scale_for_dpi(300)) as u32;
        assert_eq!(effective_dpi(px, 595.0, 300), 300);
    }

    #[test]
    fn effective_dpi_drops_when_the_pixel_cap_applies() {
        // A0 is 2384 pt wide; capped to 6000 px that is ~181 DPI.
        assert_eq!(effective_dpi(6000, 2384.0, 300), 181);
    }

    #[test]
    fn effective_dpi_falls_back_to_request() {
        assert_eq!(effective_dpi(0, 595.0, 300), 300);
        assert_eq!(effective_dpi(2480, 0.0, 300), 300);
    }

    #[test]
    fn a4_at_300_dpi_fits_default_cap() {
        // A4 is 595 × 842 pt.
        let scale = scale_for_dpi(300);
        let (w, h) = ((595.0 * scale) as u32, (842.0 * scale) as u32);
        let cap = GraderConfig::default().max_rendered_pixels;
        assert!(w <= cap && h <= cap, "{w}x{h} exceeds {cap}");
    }
}
