//! PDF documents and pages on top of `lopdf`.
//!
//! Text is extracted glyph by glyph from the page content stream so that
//! every character keeps its box and the bytes it came from. Redaction
//! rewrites the content stream: covered glyphs are cut out of their strings
//! and replaced by a positioning adjustment, then the regions are painted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as LopdfDocument, Object, ObjectId, StringFormat};

use super::layer::{Glyph, GlyphSource, TextLayer, TextRun};
use super::RedactionPage;
use crate::detect::{detect_format_from_bytes, detect_format_from_path, PdfFormat};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::redact::{Fill, MaskRegion};

/// Resource name of the font used for overlay text.
const OVERLAY_FONT: &str = "TarjaHelv";

/// Glyph width (in text space units per point of font size) when the font has no `/Widths`.
const DEFAULT_GLYPH_WIDTH: f32 = 0.5;

/// A loaded PDF document.
///
/// The underlying file handle is not kept open; the document lives in memory
/// until it is dropped.
pub struct PdfDocument {
    doc: LopdfDocument,
    path: Option<PathBuf>,
    format: PdfFormat,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Verify it's a PDF
        let format = detect_format_from_path(path)?;
        let doc = LopdfDocument::load(path)?;

        Ok(Self::from_parts(doc, Some(path.to_path_buf()), format))
    }

    /// Load a PDF from bytes.
    ///
    /// Documents loaded this way have no source path, so OCR cannot render them.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let format = detect_format_from_bytes(data)?;
        let doc = LopdfDocument::load_mem(data)?;
        Ok(Self::from_parts(doc, None, format))
    }

    fn from_parts(doc: LopdfDocument, path: Option<PathBuf>, format: PdfFormat) -> Self {
        if doc.is_encrypted() {
            log::warn!("Document is encrypted; text extraction may fail");
        }
        let pages = doc.get_pages();
        Self {
            doc,
            path,
            format,
            pages,
        }
    }

    /// Source file, if the document was opened from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Header version.
    pub fn format(&self) -> &PdfFormat {
        &self.format
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page numbers in order (1-indexed).
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Load a page with its native text layer.
    pub fn page(&mut self, number: u32) -> Result<PdfPage<'_>> {
        let id = *self
            .pages
            .get(&number)
            .ok_or(Error::PageOutOfRange(number, self.pages.len() as u32))?;

        let media_box = media_box(&self.doc, id);
        let operations = match page_content(&self.doc, id)? {
            Some(data) => {
                Content::decode(&data)
                    .map_err(|e| Error::PdfParse(e.to_string()))?
                    .operations
            }
            None => Vec::new(),
        };
        let runs = GlyphExtractor::new(&self.doc, id)?.extract(&operations);

        Ok(PdfPage {
            doc: &mut self.doc,
            id,
            number,
            media_box,
            operations,
            native: TextLayer::from_runs(runs),
            ocr: None,
            pending: Vec::new(),
        })
    }

    /// Write the document to `path`.
    ///
    /// The file is written to a temporary sibling first and moved into place,
    /// so a failed save leaves no partial output behind.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let save_error = |reason: String| Error::Save {
            path: path.display().to_string(),
            reason,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| save_error(e.to_string()))?;
        self.doc
            .save_to(tmp.as_file_mut())
            .map_err(|e| save_error(e.to_string()))?;
        tmp.persist(path).map_err(|e| save_error(e.error.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("pages", &self.pages.len())
            .finish()
    }
}

/// One page of a [`PdfDocument`], borrowed mutably while it is redacted.
pub struct PdfPage<'a> {
    doc: &'a mut LopdfDocument,
    id: ObjectId,
    number: u32,
    media_box: Rect,
    operations: Vec<Operation>,
    native: TextLayer,
    ocr: Option<TextLayer>,
    pending: Vec<MaskRegion>,
}

impl PdfPage<'_> {
    /// Whether the content stream carries any visible text.
    pub fn has_native_text(&self) -> bool {
        !self.native.is_empty()
    }

    /// Search and read from `layer` instead of the native text.
    ///
    /// Native glyphs under applied regions are still removed.
    pub fn replace_text_layer(&mut self, layer: TextLayer) {
        self.ocr = Some(layer);
    }

    /// Whether the active text layer came from OCR.
    pub fn is_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// The layer used for text and search.
    pub fn layer(&self) -> &TextLayer {
        self.ocr.as_ref().unwrap_or(&self.native)
    }

    /// Regions queued and not yet applied.
    pub fn pending(&self) -> &[MaskRegion] {
        &self.pending
    }

    /// The page box in page space.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// Add the overlay font to the page resources.
    ///
    /// Returns `false` when the page has no resources of its own to extend.
    fn install_overlay_font(&mut self) -> Result<bool> {
        let resources_id = match self.doc.get_dictionary(self.id)?.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(_)) => None,
            _ => {
                log::warn!(
                    "Page {} has no own /Resources; overlay text falls back to black",
                    self.number
                );
                return Ok(false);
            }
        };

        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let fonts_ref = match resources(self.doc, self.id, resources_id)?.get(b"Font") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        if let Some(fonts_id) = fonts_ref {
            self.doc
                .get_dictionary_mut(fonts_id)?
                .set(OVERLAY_FONT, font_id);
            return Ok(true);
        }

        let res = match resources_id {
            Some(id) => self.doc.get_dictionary_mut(id)?,
            None => self
                .doc
                .get_dictionary_mut(self.id)?
                .get_mut(b"Resources")?
                .as_dict_mut()?,
        };
        let inline_fonts = matches!(res.get(b"Font"), Ok(Object::Dictionary(_)));
        if inline_fonts {
            res.get_mut(b"Font")?.as_dict_mut()?.set(OVERLAY_FONT, font_id);
        } else {
            res.set("Font", dictionary! { OVERLAY_FONT => font_id });
        }
        Ok(true)
    }
}

impl RedactionPage for PdfPage<'_> {
    fn number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> (f32, f32) {
        (self.media_box.width(), self.media_box.height())
    }

    fn text(&self) -> String {
        self.layer().text()
    }

    fn search_for(&self, needle: &str) -> Vec<Rect> {
        self.layer().search(needle)
    }

    fn add_redaction(&mut self, region: MaskRegion) {
        self.pending.push(region);
    }

    fn apply_redactions(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let regions = std::mem::take(&mut self.pending);

        let covered = |glyph: &Glyph| {
            let (x, y) = glyph.bbox.center();
            glyph.source.is_some() && regions.iter().any(|r| r.rect.contains_point(x, y))
        };

        let mut removals: HashMap<usize, Vec<GlyphSource>> = HashMap::new();
        let mut seen = BTreeSet::new();
        for source in self.native.glyphs().filter(|g| covered(g)).filter_map(|g| g.source) {
            // Several characters decoded from one code share a source
            if seen.insert((source.op, source.item, source.byte_start)) {
                removals.entry(source.op).or_default().push(source);
            }
        }
        log::debug!(
            "Page {}: removing {} glyphs under {} regions",
            self.number,
            seen.len(),
            regions.len()
        );

        let overlay_font = if regions.iter().any(|r| matches!(r.fill, Fill::Overlay { .. })) {
            self.install_overlay_font()?
        } else {
            false
        };

        let mut operations = Vec::with_capacity(self.operations.len() + regions.len() * 8 + 2);
        operations.push(Operation::new("q", vec![]));
        for (index, op) in self.operations.iter().enumerate() {
            match removals.get(&index) {
                Some(sources) => operations.extend(strip_glyphs(op, sources)),
                None => operations.push(op.clone()),
            }
        }
        operations.push(Operation::new("Q", vec![]));
        for region in &regions {
            operations.extend(fill_operations(region, overlay_font));
        }

        let content = Content { operations };
        let data = content
            .encode()
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        self.doc.change_page_content(self.id, data)?;

        self.operations = content.operations;
        self.native.detach(covered);
        Ok(regions.len())
    }
}

/// The resource dictionary of a page, direct or referenced.
fn resources(
    doc: &LopdfDocument,
    page_id: ObjectId,
    resources_id: Option<ObjectId>,
) -> Result<&Dictionary> {
    Ok(match resources_id {
        Some(id) => doc.get_dictionary(id)?,
        None => doc.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?,
    })
}

/// Cut `sources` out of a text-showing operation.
///
/// The result always shows text with `TJ`, so removed codes can be replaced
/// by their displacement.
fn strip_glyphs(op: &Operation, sources: &[GlyphSource]) -> Vec<Operation> {
    let split = |object: &Object, item: Option<usize>| -> Vec<Object> {
        match object {
            Object::String(bytes, format) => {
                let mut removed: Vec<&GlyphSource> =
                    sources.iter().filter(|s| s.item == item).collect();
                removed.sort_by_key(|s| s.byte_start);
                split_string(bytes, *format, &removed)
            }
            other => vec![other.clone()],
        }
    };

    match op.operator.as_str() {
        "Tj" => match op.operands.first() {
            Some(text) => vec![Operation::new("TJ", vec![Object::Array(split(text, None))])],
            None => vec![op.clone()],
        },
        "TJ" => match op.operands.first() {
            Some(Object::Array(items)) => {
                let items = items
                    .iter()
                    .enumerate()
                    .flat_map(|(i, item)| split(item, Some(i)))
                    .collect();
                vec![Operation::new("TJ", vec![Object::Array(items)])]
            }
            _ => vec![op.clone()],
        },
        "'" => match op.operands.first() {
            Some(text) => vec![
                Operation::new("T*", vec![]),
                Operation::new("TJ", vec![Object::Array(split(text, None))]),
            ],
            None => vec![op.clone()],
        },
        "\"" if op.operands.len() >= 3 => vec![
            Operation::new("Tw", vec![op.operands[0].clone()]),
            Operation::new("Tc", vec![op.operands[1].clone()]),
            Operation::new("T*", vec![]),
            Operation::new("TJ", vec![Object::Array(split(&op.operands[2], None))]),
        ],
        _ => vec![op.clone()],
    }
}

/// Split a string operand around removed codes, `removed` sorted by offset.
fn split_string(bytes: &[u8], format: StringFormat, removed: &[&GlyphSource]) -> Vec<Object> {
    let mut parts = Vec::new();
    let mut cursor = 0;
    for source in removed {
        let start = source.byte_start.min(bytes.len());
        if start > cursor {
            parts.push(Object::String(bytes[cursor..start].to_vec(), format));
        }
        parts.push(Object::Real(-source.advance));
        cursor = cursor.max(start + source.byte_len);
    }
    if cursor < bytes.len() {
        parts.push(Object::String(bytes[cursor..].to_vec(), format));
    }
    parts
}

/// Paint operations for one region, isolated in their own graphics state.
fn fill_operations(region: &MaskRegion, overlay_font: bool) -> Vec<Operation> {
    let r = region.rect;
    let rect = Operation::new(
        "re",
        vec![
            Object::Real(r.x0),
            Object::Real(r.y0),
            Object::Real(r.width()),
            Object::Real(r.height()),
        ],
    );

    let mut ops = vec![Operation::new("q", vec![])];
    match &region.fill {
        Fill::Overlay { text } if overlay_font => {
            let size = r.height() * 0.8;
            ops.push(Operation::new("g", vec![Object::Integer(1)]));
            ops.push(rect);
            ops.push(Operation::new("f", vec![]));
            ops.push(Operation::new("g", vec![Object::Integer(0)]));
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(OVERLAY_FONT.as_bytes().to_vec()), Object::Real(size)],
            ));
            ops.push(Operation::new(
                "Td",
                vec![Object::Real(r.x0), Object::Real(r.y0 + r.height() * 0.2)],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(latin1_bytes(text), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }
        _ => {
            ops.push(Operation::new("g", vec![Object::Integer(0)]));
            ops.push(rect);
            ops.push(Operation::new("f", vec![]));
        }
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Page content stream bytes, `None` for a page without `/Contents`.
fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Option<Vec<u8>>> {
    let page_dict = doc.get_dictionary(page_id)?;
    let contents = match page_dict.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(None),
    };

    match contents {
        Object::Reference(r) => match doc.get_object(*r) {
            Ok(Object::Stream(s)) => s
                .decompressed_content()
                .map(Some)
                .map_err(|e| Error::PdfParse(e.to_string())),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        },
        Object::Array(arr) => {
            let mut content = Vec::new();
            for obj in arr {
                if let Object::Reference(r) = obj {
                    if let Ok(Object::Stream(s)) = doc.get_object(*r) {
                        if let Ok(data) = s.decompressed_content() {
                            content.extend_from_slice(&data);
                            content.push(b' ');
                        }
                    }
                }
            }
            Ok(Some(content))
        }
        _ => Err(Error::PdfParse("Invalid content stream".to_string())),
    }
}

/// The page's `/MediaBox`, looked up through the page tree; US Letter if absent.
fn media_box(doc: &LopdfDocument, page_id: ObjectId) -> Rect {
    let mut current = doc.get_dictionary(page_id).ok();
    // Page trees are shallow; the bound guards against reference cycles
    for _ in 0..32 {
        let Some(dict) = current else { break };
        if let Ok(values) = dict.get(b"MediaBox").and_then(|o| o.as_array()) {
            let values: Vec<f32> = values.iter().filter_map(get_number).collect();
            if values.len() >= 4 {
                return Rect::new(values[0], values[1], values[2], values[3]);
            }
        }
        current = dict
            .get(b"Parent")
            .and_then(|p| p.as_reference())
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }
    Rect::new(0.0, 0.0, 612.0, 792.0)
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Affine transform in PDF row-vector form `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f32> = operands.iter().filter_map(get_number).collect();
        if v.len() < 6 {
            return None;
        }
        Some(Matrix {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Pre-multiply by a translation, as `Td` does.
    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx * self.a + ty * self.c;
        self.f += tx * self.b + ty * self.d;
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Page-space bounds of a text-space box.
    fn bounds(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        let corners = [
            self.apply(x0, y0),
            self.apply(x1, y0),
            self.apply(x1, y1),
            self.apply(x0, y1),
        ];
        let xs = corners.iter().map(|p| p.0);
        let ys = corners.iter().map(|p| p.1);
        Rect::new(
            xs.clone().fold(f32::MAX, f32::min),
            ys.clone().fold(f32::MAX, f32::min),
            xs.fold(f32::MIN, f32::max),
            ys.fold(f32::MIN, f32::max),
        )
    }
}

/// Widths and code length of one font resource.
#[derive(Debug, Clone, Default)]
struct FontMetrics {
    first_char: u32,
    widths: Vec<f32>,
    two_byte: bool,
}

impl FontMetrics {
    fn from_dict(doc: &LopdfDocument, font: &Dictionary) -> Self {
        let resolve = |obj: &Object| -> Option<Object> {
            match obj {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            }
        };

        let two_byte = font
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|n| n == b"Type0")
            .unwrap_or(false);
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| get_number(o))
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(resolve)
            .and_then(|o| match o {
                Object::Array(arr) => Some(arr.iter().map(|w| get_number(w).unwrap_or(0.0) / 1000.0).collect()),
                _ => None,
            })
            .unwrap_or_default();

        Self {
            first_char,
            widths,
            two_byte,
        }
    }

    fn width(&self, code: u32) -> f32 {
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH)
    }
}

/// Graphics and text state relevant to glyph placement.
#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: Vec::new(),
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

/// Walks a content stream and records every shown glyph.
struct GlyphExtractor<'d> {
    doc: &'d LopdfDocument,
    fonts: BTreeMap<Vec<u8>, &'d Dictionary>,
    metrics: HashMap<Vec<u8>, FontMetrics>,
    state: TextState,
    stack: Vec<TextState>,
    tm: Matrix,
    tlm: Matrix,
}

impl<'d> GlyphExtractor<'d> {
    fn new(doc: &'d LopdfDocument, page_id: ObjectId) -> Result<Self> {
        let fonts = doc
            .get_page_fonts(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let metrics = fonts
            .iter()
            .map(|(name, font)| (name.clone(), FontMetrics::from_dict(doc, font)))
            .collect();

        Ok(Self {
            doc,
            fonts,
            metrics,
            state: TextState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
        })
    }

    fn extract(mut self, operations: &[Operation]) -> Vec<TextRun> {
        let mut runs = Vec::new();
        let mut in_text_block = false;

        for (index, op) in operations.iter().enumerate() {
            let num = |i: usize| op.operands.get(i).and_then(get_number);
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        self.state.ctm = m.then(&self.state.ctm);
                    }
                }
                "BT" => {
                    in_text_block = true;
                    self.tm = Matrix::IDENTITY;
                    self.tlm = Matrix::IDENTITY;
                }
                "ET" => in_text_block = false,
                "Tf" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.state.font = name.clone();
                    }
                    self.state.size = num(1).unwrap_or(12.0);
                }
                "Tc" => self.state.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => self.state.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => self.state.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
                "TL" => self.state.leading = num(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let tx = num(0).unwrap_or(0.0);
                    let ty = num(1).unwrap_or(0.0);
                    if op.operator == "TD" {
                        self.state.leading = -ty;
                    }
                    self.tlm.translate(tx, ty);
                    self.tm = self.tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        self.tm = m;
                        self.tlm = m;
                    }
                }
                "T*" => self.next_line(),
                "Tj" if in_text_block => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        runs.extend(self.show(index, &[(None, bytes.as_slice())], &[]));
                    }
                }
                "TJ" if in_text_block => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        let strings: Vec<_> = items
                            .iter()
                            .enumerate()
                            .filter_map(|(i, item)| match item {
                                Object::String(bytes, _) => Some((Some(i), bytes.as_slice())),
                                _ => None,
                            })
                            .collect();
                        let adjustments: Vec<_> = items
                            .iter()
                            .enumerate()
                            .filter_map(|(i, item)| get_number(item).map(|n| (i, n)))
                            .collect();
                        runs.extend(self.show(index, &strings, &adjustments));
                    }
                }
                "'" if in_text_block => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        runs.extend(self.show(index, &[(None, bytes.as_slice())], &[]));
                    }
                }
                "\"" if in_text_block => {
                    self.state.word_spacing = num(0).unwrap_or(self.state.word_spacing);
                    self.state.char_spacing = num(1).unwrap_or(self.state.char_spacing);
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                        runs.extend(self.show(index, &[(None, bytes.as_slice())], &[]));
                    }
                }
                _ => {}
            }
        }

        runs
    }

    fn next_line(&mut self) {
        self.tlm.translate(0.0, -self.state.leading);
        self.tm = self.tlm;
    }

    /// Show strings interleaved with `TJ` adjustments (both keyed by array index).
    fn show(
        &mut self,
        op: usize,
        strings: &[(Option<usize>, &[u8])],
        adjustments: &[(usize, f32)],
    ) -> Option<TextRun> {
        let size = self.state.size;
        let start = self.tm.then(&self.state.ctm);
        let baseline = start.apply(0.0, 0.0).1;
        let effective_size = size * start.vertical_scale();

        let mut glyphs = Vec::new();
        let mut adjustments = adjustments.iter().peekable();
        for &(item, bytes) in strings {
            // Adjustments that precede this string in the array
            while let Some(&&(i, n)) = adjustments.peek() {
                if item.is_some_and(|item| i > item) {
                    break;
                }
                self.adjust(n, &mut glyphs);
                adjustments.next();
            }
            self.show_string(op, item, bytes, &mut glyphs);
        }
        for &(_, n) in adjustments {
            self.adjust(n, &mut glyphs);
        }

        if glyphs.is_empty() {
            None
        } else {
            Some(TextRun::new(glyphs, baseline, effective_size))
        }
    }

    fn show_string(&mut self, op: usize, item: Option<usize>, bytes: &[u8], glyphs: &mut Vec<Glyph>) {
        let size = self.state.size;
        let th = self.state.horizontal_scale;
        let metrics = self.metrics.get(&self.state.font).cloned().unwrap_or_default();
        let encoding = self
            .fonts
            .get(&self.state.font)
            .and_then(|f| f.get_font_encoding(self.doc).ok());
        let step = if metrics.two_byte { 2 } else { 1 };

        for (n, code) in bytes.chunks(step).enumerate() {
            let value = code.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            let w0 = metrics.width(value);
            let spacing = self.state.char_spacing
                + if code == b" " {
                    self.state.word_spacing
                } else {
                    0.0
                };
            let tx = (w0 * size + spacing) * th;

            let text = match &encoding {
                Some(enc) => LopdfDocument::decode_text(enc, code)
                    .unwrap_or_else(|_| decode_code_simple(code)),
                None => decode_code_simple(code),
            };
            let chars: Vec<char> = text.chars().collect();
            if !chars.is_empty() {
                let m = self.tm.then(&self.state.ctm);
                let share = w0 * size * th / chars.len() as f32;
                let advance = if size * th != 0.0 {
                    tx * 1000.0 / (size * th)
                } else {
                    0.0
                };
                for (k, &ch) in chars.iter().enumerate() {
                    glyphs.push(Glyph {
                        ch,
                        bbox: m.bounds(
                            k as f32 * share,
                            -0.2 * size,
                            (k + 1) as f32 * share,
                            0.8 * size,
                        ),
                        source: Some(GlyphSource {
                            op,
                            item,
                            byte_start: n * step,
                            byte_len: code.len(),
                            advance,
                        }),
                    });
                }
            }
            self.tm.translate(tx, 0.0);
        }
    }

    /// Apply a `TJ` number; a large negative one reads as a word break.
    fn adjust(&mut self, n: f32, glyphs: &mut Vec<Glyph>) {
        let size = self.state.size;
        let tx = -n / 1000.0 * size * self.state.horizontal_scale;
        let before = self.tm.then(&self.state.ctm);
        self.tm.translate(tx, 0.0);

        if -n > 200.0 && glyphs.last().is_some_and(|g| !g.ch.is_whitespace()) {
            let after = self.tm.then(&self.state.ctm);
            let (x0, _) = before.apply(0.0, 0.0);
            let (x1, _) = after.apply(0.0, 0.0);
            let bottom = before.apply(0.0, -0.2 * size).1;
            let top = before.apply(0.0, 0.8 * size).1;
            glyphs.push(Glyph::synthetic_space(x0, x1, bottom, top));
        }
    }
}

/// Decode one character code without a font encoding: Latin-1 for single
/// bytes, UTF-16BE for two-byte codes.
fn decode_code_simple(code: &[u8]) -> String {
    match code {
        [b] => char::from(*b).to_string(),
        [hi, lo] => char::from_u32(u32::from(u16::from_be_bytes([*hi, *lo])))
            .map(String::from)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(byte_start: usize, advance: f32) -> GlyphSource {
        GlyphSource {
            op: 0,
            item: None,
            byte_start,
            byte_len: 1,
            advance,
        }
    }

    #[test]
    fn test_matrix_then() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let shift = Matrix {
            e: 10.0,
            f: 20.0,
            ..Matrix::IDENTITY
        };
        let m = scale.then(&shift);
        assert_eq!(m.apply(1.0, 1.0), (12.0, 22.0));
        let m = shift.then(&scale);
        assert_eq!(m.apply(1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn test_matrix_translate_like_td() {
        let mut tm = Matrix::IDENTITY;
        tm.translate(100.0, 700.0);
        tm.translate(0.0, -14.0);
        assert_eq!(tm.apply(0.0, 0.0), (100.0, 686.0));
    }

    #[test]
    fn test_split_string_keeps_surrounding_bytes() {
        let a = source(2, 600.0);
        let b = source(3, 600.0);
        let parts = split_string(b"ab12cd", StringFormat::Literal, &[&a, &b]);
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], Object::String(bytes, _) if bytes.as_slice() == b"ab"));
        assert!(matches!(parts[1], Object::Real(n) if n == -600.0));
        assert!(matches!(parts[2], Object::Real(n) if n == -600.0));
        assert!(matches!(&parts[3], Object::String(bytes, _) if bytes.as_slice() == b"cd"));
    }

    #[test]
    fn test_strip_tj_becomes_tj_array() {
        let op = Operation::new(
            "Tj",
            vec![Object::String(b"x9y".to_vec(), StringFormat::Literal)],
        );
        let ops = strip_glyphs(&op, &[source(1, 500.0)]);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operator, "TJ");
        match &ops[0].operands[0] {
            Object::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected operand {:?}", other),
        }
    }

    #[test]
    fn test_strip_quote_expands() {
        let op = Operation::new(
            "'",
            vec![Object::String(b"12".to_vec(), StringFormat::Literal)],
        );
        let ops = strip_glyphs(&op, &[source(0, 500.0)]);
        let operators: Vec<_> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(operators, vec!["T*", "TJ"]);
    }

    #[test]
    fn test_fill_operations_black() {
        let region = MaskRegion {
            rect: Rect::new(10.0, 20.0, 30.0, 32.0),
            fill: Fill::Black,
        };
        let ops = fill_operations(&region, false);
        let operators: Vec<_> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(operators, vec!["q", "g", "re", "f", "Q"]);
    }

    #[test]
    fn test_overlay_without_font_paints_black() {
        let region = MaskRegion {
            rect: Rect::new(10.0, 20.0, 30.0, 32.0),
            fill: Fill::Overlay {
                text: "***".to_string(),
            },
        };
        assert_eq!(fill_operations(&region, false).len(), 5);
        let ops = fill_operations(&region, true);
        assert!(ops.iter().any(|o| o.operator == "Tj"));
    }

    #[test]
    fn test_font_metrics_width() {
        let metrics = FontMetrics {
            first_char: 32,
            widths: vec![0.25, 0.0, 0.6],
            two_byte: false,
        };
        assert_eq!(metrics.width(32), 0.25);
        assert_eq!(metrics.width(33), DEFAULT_GLYPH_WIDTH);
        assert_eq!(metrics.width(34), 0.6);
        assert_eq!(metrics.width(10), DEFAULT_GLYPH_WIDTH);
        assert_eq!(metrics.width(200), DEFAULT_GLYPH_WIDTH);
    }

    #[test]
    fn test_decode_code_simple() {
        assert_eq!(decode_code_simple(&[0xE3]), "ã");
        assert_eq!(decode_code_simple(&[0x00, 0x41]), "A");
    }
}
