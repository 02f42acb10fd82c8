//! # tarja
//!
//! Detection and redaction of Brazilian personal identifiers in PDF documents.
//!
//! The library finds CPF, RG, voter-title and driver's-license (CNH) numbers
//! in the text of each page, validates them (check digits, digit counts,
//! surrounding keywords) and covers them with opaque boxes. CPFs keep their
//! middle six digits visible; the other types are hidden entirely.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tarja::{redact_file, RedactOptions};
//!
//! fn main() -> tarja::Result<()> {
//!     let report = redact_file("contrato.pdf", "contrato-tarjado.pdf", RedactOptions::default())?;
//!     println!("{} identifiers masked", report.total_matches());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Checksum validation**: CPFs must pass both check digits
//! - **Context filtering**: currency amounts, CNPJs and labelled account numbers are skipped
//! - **Partial masking**: first three and last two CPF digits, the rest left readable
//! - **Content-stream redaction**: covered glyphs are removed, not just painted over
//! - **OCR fallback**: scanned pages go through `pdftoppm` and `tesseract`
//! - **Batch processing**: whole directories in parallel with Rayon

pub mod batch;
pub mod detect;
pub mod document;
pub mod error;
pub mod geometry;
pub mod identifier;
pub mod ocr;
pub mod redact;

// Re-export commonly used types
pub use batch::{find_inputs, redact_dir, BatchEvent, BatchReport, DocumentOutcome};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use document::{PdfDocument, PdfPage, RedactionPage};
pub use error::{Error, Result};
pub use geometry::{Quad, Rect};
pub use identifier::{
    is_valid_cpf, ContextConfig, IdentifierType, MaskPolicy, PatternCatalog, ValidatedMatch,
};
pub use ocr::{OcrEngine, TesseractOcr};
pub use redact::{
    masked_display, DocumentReport, FillStyle, Finding, PageReport, PageSelection, RedactOptions,
    Redactor,
};

use std::path::Path;

/// Redact a PDF file into `output`.
///
/// Pages without a text layer are sent through [`TesseractOcr`] when the
/// options allow it; a missing OCR tool only skips those pages.
///
/// # Example
///
/// ```no_run
/// use tarja::{redact_file, FillStyle, RedactOptions};
///
/// let options = RedactOptions::new().with_fill(FillStyle::overlay());
/// let report = redact_file("in.pdf", "out.pdf", options).unwrap();
/// println!("{} regions", report.total_regions());
/// ```
pub fn redact_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: RedactOptions,
) -> Result<DocumentReport> {
    Redactor::new(options)
        .with_ocr(TesseractOcr::new())
        .redact_file(input, output)
}

/// Validated identifiers in a PDF file, with their masked form and geometry.
///
/// Nothing is written.
///
/// # Example
///
/// ```no_run
/// use tarja::scan_file;
///
/// for finding in scan_file("in.pdf").unwrap() {
///     println!("page {}: {} {}", finding.page, finding.kind, finding.masked);
/// }
/// ```
pub fn scan_file<P: AsRef<Path>>(path: P) -> Result<Vec<Finding>> {
    Redactor::default()
        .with_ocr(TesseractOcr::new())
        .scan_file(path)
}

/// Validated identifiers in a piece of text, ordered by position.
///
/// # Example
///
/// ```
/// use tarja::{scan_text, IdentifierType};
///
/// let found = scan_text("CPF: 529.982.247-25");
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].kind, IdentifierType::Cpf);
/// ```
pub fn scan_text(text: &str) -> Vec<ValidatedMatch> {
    Redactor::default().scan_text(&redact::flatten(text))
}
