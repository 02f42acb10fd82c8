//! OCR through the `pdftoppm` and `tesseract` command-line tools.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{OcrEngine, OcrPage, OcrWord};
use crate::error::{Error, Result};
use crate::geometry::Quad;

/// Renders a page with `pdftoppm` and recognizes it with `tesseract`.
///
/// Intermediate images live in a temporary directory removed when the call
/// returns.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    /// Render resolution
    pub dpi: u32,
    /// Tesseract language code
    pub language: String,
    /// Path or name of the rasterizer binary
    pub pdftoppm: PathBuf,
    /// Path or name of the tesseract binary
    pub tesseract: PathBuf,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            dpi: 300,
            language: "por".to_string(),
            pdftoppm: PathBuf::from("pdftoppm"),
            tesseract: PathBuf::from("tesseract"),
        }
    }
}

impl TesseractOcr {
    /// Create an engine with defaults (300 dpi, Portuguese).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tesseract language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the render resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(72);
        self
    }

    fn render(&self, source: &Path, page: u32, dir: &Path) -> Result<PathBuf> {
        let page_arg = page.to_string();
        let mut cmd = Command::new(&self.pdftoppm);
        cmd.args(["-f", &page_arg, "-l", &page_arg])
            .args(["-r", &self.dpi.to_string(), "-png"])
            .arg(source)
            .arg(dir.join("page"));
        run(&mut cmd, page)?;

        fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .find(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
            .ok_or_else(|| Error::Ocr {
                page,
                reason: "rasterizer produced no image".to_string(),
            })
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, source: &Path, page_number: u32) -> Result<OcrPage> {
        let dir = tempfile::TempDir::new()?;
        let image = self.render(source, page_number, dir.path())?;

        let base = dir.path().join("ocr");
        let mut cmd = Command::new(&self.tesseract);
        cmd.arg(&image)
            .arg(&base)
            .args(["-l", &self.language])
            .arg("tsv");
        run(&mut cmd, page_number)?;

        let tsv = fs::read_to_string(base.with_extension("tsv"))?;
        let page = parse_tsv(&tsv).ok_or_else(|| Error::Ocr {
            page: page_number,
            reason: "no page entry in tesseract output".to_string(),
        })?;
        log::debug!(
            "OCR page {}: {} words at {}x{}",
            page_number,
            page.words.len(),
            page.image_width,
            page.image_height
        );
        Ok(page)
    }
}

/// Run a tool, mapping spawn and exit failures to OCR errors.
fn run(cmd: &mut Command, page: u32) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let output = cmd.output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::OcrUnavailable(program.clone()),
        _ => Error::Io(e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => format!("{} exited with {}", program, output.status),
            message => format!("{}: {}", program, message),
        };
        return Err(Error::Ocr { page, reason });
    }
    Ok(())
}

/// Parse tesseract TSV output.
///
/// The level-1 row carries the raster size; level-5 rows are words. Returns
/// `None` when there is no level-1 row.
fn parse_tsv(tsv: &str) -> Option<OcrPage> {
    let mut page: Option<OcrPage> = None;
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            continue;
        }
        let number = |i: usize| fields[i].trim().parse::<f32>().ok();
        let (Some(left), Some(top), Some(width), Some(height)) = (number(6), number(7), number(8), number(9)) else {
            continue;
        };

        match fields[0].trim() {
            "1" => {
                page = Some(OcrPage {
                    image_width: left + width,
                    image_height: top + height,
                    words: Vec::new(),
                });
            }
            "5" => {
                let text = fields.get(11).copied().unwrap_or("").trim();
                if text.is_empty() {
                    continue;
                }
                words.push(OcrWord {
                    quad: Quad::from_box(left, top, width, height),
                    text: text.to_string(),
                    confidence: number(10).unwrap_or(0.0),
                });
            }
            _ => {}
        }
    }

    page.map(|mut p| {
        p.words = words;
        p
    })
}
