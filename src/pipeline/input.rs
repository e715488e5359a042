//! Input validation: make sure an upload is a PDF before pdfium opens it.
//!
//! pdfium's own load errors are opaque (`FormatError`, `UnknownError`); a
//! magic-byte check up front lets us tell "you uploaded a JPEG" apart from
//! "this PDF is damaged".

use crate::error::ExtractionError;
use tracing::debug;

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check that `bytes` plausibly hold a PDF document.
///
/// Returns [`ExtractionError::NotAPdf`] for empty input or input that does
/// not start with `%PDF`.
pub fn validate_pdf_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        let magic = bytes.iter().take(PDF_MAGIC.len()).copied().collect();
        return Err(ExtractionError::NotAPdf { magic });
    }
    debug!("PDF magic ok ({} bytes)", bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_header() {
        assert!(validate_pdf_bytes(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").is_ok());
    }

    #[test]
    fn rejects_empty_input() {
        match validate_pdf_bytes(b"") {
            Err(ExtractionError::NotAPdf { magic }) => assert!(magic.is_empty()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn rejects_other_formats() {
        // PNG signature
        match validate_pdf_bytes(b"\x89PNG\r\n\x1a\n") {
            Err(ExtractionError::NotAPdf { magic }) => assert_eq!(magic, b"\x89PNG".to_vec()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(validate_pdf_bytes(b"%PD").is_err());
        assert!(validate_pdf_bytes(b"hello world").is_err());
    }
}
