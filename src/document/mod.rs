//! Document access: the page contract the engine works against and its
//! `lopdf` implementation.

mod layer;
mod pdf;

pub use layer::{Glyph, GlyphSource, TextLayer, TextLine, TextRun};
pub use pdf::{PdfDocument, PdfPage};

use crate::error::Result;
use crate::geometry::Rect;
use crate::redact::MaskRegion;

/// One page as seen by the redaction engine.
///
/// The engine only reads text and geometry and queues regions; committing
/// them is up to the implementation.
pub trait RedactionPage {
    /// 1-indexed page number.
    fn number(&self) -> u32;

    /// Page width and height in points.
    fn size(&self) -> (f32, f32);

    /// Page text, one line per `\n`.
    fn text(&self) -> String;

    /// Rectangles of every exact occurrence of `needle`, in reading order.
    fn search_for(&self, needle: &str) -> Vec<Rect>;

    /// Queue a region for redaction.
    fn add_redaction(&mut self, region: MaskRegion);

    /// Commit queued regions: remove the text under them and paint them.
    ///
    /// Returns the number of regions applied.
    fn apply_redactions(&mut self) -> Result<usize>;
}
