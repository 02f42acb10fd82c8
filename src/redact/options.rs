//! Redaction options and configuration.

use std::ops::RangeInclusive;

use super::mask::FillStyle;
use crate::identifier::{ContextConfig, IdentifierType};

/// Options for redacting documents.
#[derive(Debug, Clone)]
pub struct RedactOptions {
    /// How masked regions are painted
    pub fill: FillStyle,

    /// Run OCR on every page, ignoring the native text layer
    pub force_ocr: bool,

    /// Run OCR on pages with no native text (requires an OCR engine)
    pub ocr_fallback: bool,

    /// OCR words below this confidence (0-100) are dropped
    pub min_ocr_confidence: f32,

    /// Identifier types to look for
    pub types: Vec<IdentifierType>,

    /// Context filter keyword lists and windows
    pub context: ContextConfig,

    /// Page selection (which pages to redact)
    pub pages: PageSelection,

    /// Whether batches process documents in parallel
    pub parallel: bool,
}

impl RedactOptions {
    /// Create new redaction options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fill style.
    pub fn with_fill(mut self, fill: FillStyle) -> Self {
        self.fill = fill;
        self
    }

    /// Force OCR on every page.
    pub fn with_force_ocr(mut self, force: bool) -> Self {
        self.force_ocr = force;
        self
    }

    /// Enable or disable the OCR fallback for pages without text.
    pub fn with_ocr_fallback(mut self, enabled: bool) -> Self {
        self.ocr_fallback = enabled;
        self
    }

    /// Set the minimum OCR word confidence.
    pub fn with_min_ocr_confidence(mut self, confidence: f32) -> Self {
        self.min_ocr_confidence = confidence.clamp(0.0, 100.0);
        self
    }

    /// Restrict detection to the given identifier types.
    pub fn with_types(mut self, types: Vec<IdentifierType>) -> Self {
        self.types = types;
        self
    }

    /// Set the context filter configuration.
    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            fill: FillStyle::Black,
            force_ocr: false,
            ocr_fallback: true,
            min_ocr_confidence: 30.0,
            types: IdentifierType::ALL.to_vec(),
            context: ContextConfig::default(),
            pages: PageSelection::All,
            parallel: true,
        }
    }
}

/// Page selection for redaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// Every page
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
    /// Several ranges (inclusive, 1-indexed), e.g. "1,3,5-7"
    Ranges(Vec<RangeInclusive<u32>>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
            PageSelection::Ranges(ranges) => ranges.iter().any(|r| r.contains(&page)),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5-7").
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                return Ok(PageSelection::Range(page_range(start, end)?));
            }
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let range = match part.split_once('-') {
                Some((start, end)) => page_range(start, end)?,
                None => page_range(part, part)?,
            };
            ranges.push(range);
        }

        ranges.sort_by_key(|r| (*r.start(), *r.end()));
        ranges.dedup();
        Ok(PageSelection::Ranges(ranges))
    }
}

/// An inclusive, non-empty range of 1-indexed pages.
fn page_range(start: &str, end: &str) -> Result<RangeInclusive<u32>, String> {
    let start: u32 = start.trim().parse().map_err(|_| "Invalid start page")?;
    let end: u32 = end.trim().parse().map_err(|_| "Invalid end page")?;
    if start == 0 {
        return Err("Pages are numbered from 1".to_string());
    }
    if start > end {
        return Err(format!("Reversed page range {}-{}", start, end));
    }
    Ok(start..=end)
}
