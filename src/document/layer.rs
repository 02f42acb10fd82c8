//! Positioned text layer: glyphs grouped into runs and lines.
//!
//! Both the native PDF text and OCR output end up as a [`TextLayer`], so the
//! engine searches them the same way.

use crate::geometry::Rect;

/// Where a glyph's bytes live in the page content stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphSource {
    /// Index of the text-showing operation
    pub op: usize,
    /// Index inside a `TJ` array, `None` for `Tj`/`'`/`"`
    pub item: Option<usize>,
    /// First byte of the glyph code in the string operand
    pub byte_start: usize,
    /// Code length in bytes
    pub byte_len: usize,
    /// Horizontal displacement in thousandths of text space
    pub advance: f32,
}

/// One character with its page-space box.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// The decoded character
    pub ch: char,
    /// Bounding box in page space
    pub bbox: Rect,
    /// Content-stream origin; `None` for OCR and synthetic glyphs
    pub source: Option<GlyphSource>,
}

impl Glyph {
    /// A space inserted between two runs; it has a box but no content bytes.
    pub fn synthetic_space(x0: f32, x1: f32, bottom: f32, top: f32) -> Self {
        Self {
            ch: ' ',
            bbox: Rect::new(x0, bottom, x1.max(x0), top),
            source: None,
        }
    }
}

/// Glyphs produced by one text-showing operation (or one OCR word).
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Glyphs in drawing order
    pub glyphs: Vec<Glyph>,
    /// Baseline Y
    pub baseline: f32,
    /// Effective font size in points
    pub font_size: f32,
}

impl TextRun {
    /// Create a run from its glyphs.
    pub fn new(glyphs: Vec<Glyph>, baseline: f32, font_size: f32) -> Self {
        Self {
            glyphs,
            baseline,
            font_size,
        }
    }

    /// Left edge of the first glyph.
    pub fn x(&self) -> f32 {
        self.glyphs.first().map(|g| g.bbox.x0).unwrap_or(0.0)
    }

    /// Right edge of the last glyph.
    pub fn right(&self) -> f32 {
        self.glyphs.last().map(|g| g.bbox.x1).unwrap_or(0.0)
    }

    fn average_char_width(&self) -> f32 {
        let width = self.right() - self.x();
        if !self.glyphs.is_empty() && width > 0.0 {
            width / self.glyphs.len() as f32
        } else {
            self.font_size * 0.5
        }
    }
}

/// Glyphs sharing a baseline, left to right.
#[derive(Debug, Clone, Default)]
pub struct TextLine {
    /// Glyphs including inserted spaces
    pub glyphs: Vec<Glyph>,
    /// Baseline Y
    pub baseline: f32,
}

impl TextLine {
    /// Build a line from runs on the same baseline.
    ///
    /// A space is inserted where the gap between two runs exceeds a fifth of
    /// the average character width and neither side already has one.
    fn from_runs(mut runs: Vec<TextRun>) -> Self {
        runs.sort_by(|a, b| a.x().partial_cmp(&b.x()).unwrap_or(std::cmp::Ordering::Equal));

        let baseline = runs.first().map(|r| r.baseline).unwrap_or(0.0);
        let mut glyphs: Vec<Glyph> = Vec::new();
        let mut previous: Option<&TextRun> = None;

        for run in &runs {
            if let (Some(prev), Some(first)) = (previous, run.glyphs.first()) {
                let gap = run.x() - prev.right();
                let threshold = run.average_char_width() * 0.2;
                let prev_space = glyphs.last().is_some_and(|g| g.ch.is_whitespace());
                if gap > threshold && !prev_space && !first.ch.is_whitespace() {
                    glyphs.push(Glyph::synthetic_space(
                        prev.right(),
                        run.x(),
                        first.bbox.y0,
                        first.bbox.y1,
                    ));
                }
            }
            glyphs.extend(run.glyphs.iter().cloned());
            if !run.glyphs.is_empty() {
                previous = Some(run);
            }
        }

        Self { glyphs, baseline }
    }

    /// The line's characters.
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }
}

/// The searchable text of one page.
#[derive(Debug, Clone, Default)]
pub struct TextLayer {
    lines: Vec<TextLine>,
}

impl TextLayer {
    /// Group runs into lines, top to bottom.
    ///
    /// Runs whose baselines differ by at most 30% of the font size share a line.
    pub fn from_runs(runs: Vec<TextRun>) -> Self {
        let mut runs: Vec<TextRun> = runs.into_iter().filter(|r| !r.glyphs.is_empty()).collect();

        // PDF Y grows upwards, so descending Y is reading order
        runs.sort_by(|a, b| {
            let y_cmp = b
                .baseline
                .partial_cmp(&a.baseline)
                .unwrap_or(std::cmp::Ordering::Equal);
            if y_cmp == std::cmp::Ordering::Equal {
                a.x().partial_cmp(&b.x()).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                y_cmp
            }
        });

        let mut lines = Vec::new();
        let mut current: Vec<TextRun> = Vec::new();
        let mut current_y: Option<f32> = None;

        for run in runs {
            let tolerance = run.font_size * 0.3;
            match current_y {
                Some(y) if (run.baseline - y).abs() <= tolerance => current.push(run),
                _ => {
                    if !current.is_empty() {
                        lines.push(TextLine::from_runs(std::mem::take(&mut current)));
                    }
                    current_y = Some(run.baseline);
                    current.push(run);
                }
            }
        }
        if !current.is_empty() {
            lines.push(TextLine::from_runs(current));
        }

        Self { lines }
    }

    /// Lines in reading order.
    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    /// All glyphs in reading order.
    pub fn glyphs(&self) -> impl Iterator<Item = &Glyph> {
        self.lines.iter().flat_map(|l| l.glyphs.iter())
    }

    /// True when the layer has no visible character.
    pub fn is_empty(&self) -> bool {
        !self.glyphs().any(|g| !g.ch.is_whitespace())
    }

    /// Page text with lines separated by `\n`.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Exact substring search over the lines joined by single spaces.
    ///
    /// Returns one rectangle per non-overlapping hit, in reading order: the
    /// union of the boxes of the glyphs the hit covers. A hit that wraps onto
    /// the next line therefore yields a rectangle spanning both lines.
    pub fn search(&self, needle: &str) -> Vec<Rect> {
        if needle.is_empty() {
            return Vec::new();
        }

        let mut flat = String::new();
        let mut boxes: Vec<(usize, Option<Rect>)> = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                boxes.push((flat.len(), None));
                flat.push(' ');
            }
            for glyph in &line.glyphs {
                boxes.push((flat.len(), Some(glyph.bbox)));
                flat.push(glyph.ch);
            }
        }

        flat.match_indices(needle)
            .filter_map(|(start, hit)| {
                let end = start + hit.len();
                let lo = boxes.partition_point(|(offset, _)| *offset < start);
                let hi = boxes.partition_point(|(offset, _)| *offset < end);
                Rect::union_all(boxes[lo..hi].iter().filter_map(|(_, r)| r.as_ref()))
            })
            .collect()
    }

    /// Drop glyphs matching `remove` and forget every content-stream origin.
    ///
    /// Called after the content stream has been rewritten, when the recorded
    /// operation indices no longer hold.
    pub(crate) fn detach(&mut self, remove: impl Fn(&Glyph) -> bool) {
        for line in &mut self.lines {
            line.glyphs.retain(|g| !remove(g));
            for glyph in &mut line.glyphs {
                glyph.source = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A run of fixed-width glyphs starting at `x` on `baseline`.
    fn run(text: &str, x: f32, baseline: f32, size: f32) -> TextRun {
        let width = size * 0.5;
        let glyphs = text
            .chars()
            .enumerate()
            .map(|(i, ch)| Glyph {
                ch,
                bbox: Rect::new(
                    x + i as f32 * width,
                    baseline - size * 0.2,
                    x + (i + 1) as f32 * width,
                    baseline + size * 0.8,
                ),
                source: None,
            })
            .collect();
        TextRun::new(glyphs, baseline, size)
    }

    #[test]
    fn test_lines_grouped_by_baseline() {
        let layer = TextLayer::from_runs(vec![
            run("segunda", 72.0, 686.0, 12.0),
            run("Nome:", 72.0, 700.0, 12.0),
            run("Joao", 105.0, 701.0, 12.0),
        ]);
        assert_eq!(layer.lines().len(), 2);
        assert_eq!(layer.text(), "Nome: Joao\nsegunda");
    }

    #[test]
    fn test_no_space_for_adjacent_runs() {
        let layer = TextLayer::from_runs(vec![run("529.", 100.0, 700.0, 12.0), run("982", 124.0, 700.0, 12.0)]);
        assert_eq!(layer.text(), "529.982");
    }

    #[test]
    fn test_search_single_line() {
        let layer = TextLayer::from_runs(vec![run("CPF: 529.982.247-25", 100.0, 700.0, 12.0)]);
        let hits = layer.search("529.982.247-25");
        assert_eq!(hits.len(), 1);
        let rect = hits[0];
        assert!((rect.x0 - 130.0).abs() < 1e-3);
        assert!((rect.x1 - 214.0).abs() < 1e-3);
        assert!((rect.height() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn test_search_repeated_in_reading_order() {
        let layer = TextLayer::from_runs(vec![
            run("11144477735", 72.0, 600.0, 12.0),
            run("11144477735", 72.0, 700.0, 12.0),
        ]);
        let hits = layer.search("11144477735");
        assert_eq!(hits.len(), 2);
        assert!(hits[0].y0 > hits[1].y0);
    }

    #[test]
    fn test_search_across_line_break_is_tall() {
        let layer = TextLayer::from_runs(vec![
            run("CPF 123.456.", 400.0, 700.0, 12.0),
            run("789-09 fim", 72.0, 686.0, 12.0),
        ]);
        let hits = layer.search("123.456. 789-09");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].height() > 15.0);
        assert!(layer.search("123.456.789-09").is_empty());
    }

    #[test]
    fn test_detach_removes_glyphs() {
        let mut layer = TextLayer::from_runs(vec![run("abc", 0.0, 0.0, 10.0)]);
        layer.detach(|g| g.ch == 'b');
        assert_eq!(layer.text(), "ac");
        assert!(layer.glyphs().all(|g| g.source.is_none()));
    }

    #[test]
    fn test_empty_layer() {
        assert!(TextLayer::default().is_empty());
        assert!(TextLayer::from_runs(vec![run("   ", 0.0, 0.0, 10.0)]).is_empty());
    }
}
