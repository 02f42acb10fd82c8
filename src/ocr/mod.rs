//! Text recognition for pages without a usable text layer.

mod tesseract;

pub use tesseract::TesseractOcr;

use std::path::Path;

use crate::document::{Glyph, TextLayer, TextRun};
use crate::error::Result;
use crate::geometry::{Quad, Rect};

/// One recognized word in raster coordinates (top-left origin, pixels).
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    /// Word outline
    pub quad: Quad,
    /// Recognized text
    pub text: String,
    /// Confidence, 0 to 100
    pub confidence: f32,
}

/// Recognition result for one rendered page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPage {
    /// Raster width in pixels
    pub image_width: f32,
    /// Raster height in pixels
    pub image_height: f32,
    /// Words in engine order
    pub words: Vec<OcrWord>,
}

impl OcrPage {
    /// Convert to a text layer in page space (bottom-left origin, points).
    ///
    /// Words below `min_confidence` are dropped. Each word's box is split
    /// evenly between its characters.
    pub fn to_text_layer(&self, page_width: f32, page_height: f32, min_confidence: f32) -> TextLayer {
        if self.image_width <= 0.0 || self.image_height <= 0.0 {
            return TextLayer::default();
        }
        let sx = page_width / self.image_width;
        let sy = page_height / self.image_height;

        let runs = self
            .words
            .iter()
            .filter(|w| w.confidence >= min_confidence && !w.text.trim().is_empty())
            .map(|word| {
                let b = word.quad.bounds();
                let rect = Rect::new(
                    b.x0 * sx,
                    page_height - b.y1 * sy,
                    b.x1 * sx,
                    page_height - b.y0 * sy,
                );
                let chars: Vec<char> = word.text.trim().chars().collect();
                let share = rect.width() / chars.len() as f32;
                let glyphs = chars
                    .iter()
                    .enumerate()
                    .map(|(i, &ch)| Glyph {
                        ch,
                        bbox: Rect {
                            x0: rect.x0 + i as f32 * share,
                            x1: rect.x0 + (i + 1) as f32 * share,
                            ..rect
                        },
                        source: None,
                    })
                    .collect();
                TextRun::new(glyphs, rect.y0 + rect.height() * 0.2, rect.height())
            })
            .collect();

        TextLayer::from_runs(runs)
    }
}

/// A text-recognition backend.
pub trait OcrEngine: Send + Sync {
    /// Recognize the words of one page (1-indexed) of the document at `source`.
    fn recognize(&self, source: &Path, page_number: u32) -> Result<OcrPage>;
}
