//! Per-page and per-document results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::locate::Located;
use super::mask::MaskRegion;
use crate::identifier::{IdentifierType, ValidatedMatch};

/// One validated identifier and where it was found.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// 1-indexed page number
    pub page: u32,
    /// Identifier type
    pub kind: IdentifierType,
    /// The number with its hidden digits masked
    pub masked: String,
    /// Geometry lookup result
    pub located: Located,
    /// Regions that will be painted
    pub regions: Vec<MaskRegion>,
    /// The full match; never serialized
    #[serde(skip)]
    pub matched: ValidatedMatch,
}

/// What happened on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageReport {
    /// 1-indexed page number
    pub page: u32,
    /// Validated identifiers
    pub matches: usize,
    /// Regions applied
    pub regions: usize,
    /// Validated identifiers with no geometry on the page
    pub missed: usize,
    /// Whether the text came from OCR
    pub ocr: bool,
    /// Validated identifiers per type
    pub by_type: BTreeMap<IdentifierType, usize>,
}

impl PageReport {
    /// Empty report for a page.
    pub fn new(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }
}

/// What happened to one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Source file
    pub input: PathBuf,
    /// Written file
    pub output: PathBuf,
    /// Processed pages in order
    pub pages: Vec<PageReport>,
    /// When processing began
    pub started_at: DateTime<Utc>,
    /// When the output was saved
    pub finished_at: DateTime<Utc>,
}

impl DocumentReport {
    /// Validated identifiers over all pages.
    pub fn total_matches(&self) -> usize {
        self.pages.iter().map(|p| p.matches).sum()
    }

    /// Applied regions over all pages.
    pub fn total_regions(&self) -> usize {
        self.pages.iter().map(|p| p.regions).sum()
    }

    /// Geometry misses over all pages.
    pub fn total_missed(&self) -> usize {
        self.pages.iter().map(|p| p.missed).sum()
    }

    /// Pages whose text came from OCR.
    pub fn ocr_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.ocr).count()
    }

    /// Wall-clock processing time.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
