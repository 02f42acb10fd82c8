//! The redaction engine: page text in, masked regions out.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use unicode_normalization::UnicodeNormalization;

use super::locate::locate;
use super::mask::{masked_display, regions_for};
use super::options::RedactOptions;
use super::report::{DocumentReport, Finding, PageReport};
use crate::document::{PdfDocument, PdfPage, RedactionPage};
use crate::error::{Error, Result};
use crate::identifier::{ContextFilter, MaskPolicy, PatternCatalog, Rejection, ValidatedMatch};
use crate::ocr::OcrEngine;

/// Finds identifiers on pages and redacts them.
///
/// A `Redactor` holds no per-document state and can be shared between
/// threads.
pub struct Redactor {
    catalog: PatternCatalog,
    context: ContextFilter,
    options: RedactOptions,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl Redactor {
    /// Create a redactor for the given options, without OCR.
    pub fn new(options: RedactOptions) -> Self {
        Self {
            catalog: PatternCatalog::with_types(&options.types),
            context: ContextFilter::new(options.context.clone()),
            options,
            ocr: None,
        }
    }

    /// Use `engine` for pages without text, or for every page when OCR is forced.
    pub fn with_ocr(mut self, engine: impl OcrEngine + 'static) -> Self {
        self.ocr = Some(Box::new(engine));
        self
    }

    /// The active options.
    pub fn options(&self) -> &RedactOptions {
        &self.options
    }

    /// Validated identifiers in flattened page text, ordered by position.
    ///
    /// Overlapping matches of different types keep the higher-priority one.
    pub fn scan_text(&self, text: &str) -> Vec<ValidatedMatch> {
        let mut accepted: Vec<ValidatedMatch> = Vec::new();

        for candidate in self.catalog.candidates(text) {
            let masked = masked_display(&candidate.text, MaskPolicy::Total, '*');
            let reject = |reason: Rejection| {
                log::debug!("Rejected {} {}: {}", candidate.kind, masked, reason);
            };

            let window = match self.context.check(&candidate, text) {
                Ok(window) => window,
                Err(reason) => {
                    reject(reason);
                    continue;
                }
            };
            let Some(identifier) = self.catalog.get(candidate.kind) else {
                continue;
            };
            let digits = candidate.digits();
            if let Err(reason) = identifier.validate(&digits, &window) {
                reject(reason);
                continue;
            }
            if let Some(winner) = accepted
                .iter()
                .find(|m| m.start < candidate.end && candidate.start < m.end)
            {
                reject(Rejection::Overlap(winner.kind));
                continue;
            }

            accepted.push(ValidatedMatch::from_candidate(candidate, digits));
        }

        accepted.sort_by_key(|m| m.start);
        accepted
    }

    /// Find, validate and locate every identifier on a page without touching it.
    pub fn scan_page(&self, page: &dyn RedactionPage) -> Vec<Finding> {
        let text = flatten(&page.text());
        let mask_char = match self.options.fill {
            super::FillStyle::Overlay { mask_char } => mask_char,
            super::FillStyle::Black => '*',
        };

        let matches = self.scan_text(&text);
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut findings = Vec::with_capacity(matches.len());

        for m in &matches {
            let counter = occurrences.entry(m.text.as_str()).or_insert(0);
            let occurrence = *counter;
            *counter += 1;

            let policy = self
                .catalog
                .get(m.kind)
                .map(|i| i.mask_policy())
                .unwrap_or_else(|| m.kind.mask_policy());
            let located = locate(page, m, occurrence);
            let regions = regions_for(&located, &m.text, &m.groups, policy, self.options.fill);

            findings.push(Finding {
                page: page.number(),
                kind: m.kind,
                masked: masked_display(&m.text, policy, mask_char),
                located,
                regions,
                matched: m.clone(),
            });
        }

        findings
    }

    /// Redact one page: queue the regions of every finding, then apply them.
    pub fn redact_page(&self, page: &mut dyn RedactionPage) -> Result<PageReport> {
        let findings = self.scan_page(&*page);
        let mut report = PageReport::new(page.number());

        for finding in findings {
            report.matches += 1;
            *report.by_type.entry(finding.kind).or_insert(0) += 1;
            if !finding.located.is_found() {
                log::warn!(
                    "Page {}: {} {} found in text but not on the page",
                    report.page,
                    finding.kind,
                    finding.masked
                );
                report.missed += 1;
            }
            for region in finding.regions {
                page.add_redaction(region);
            }
        }

        report.regions = page.apply_redactions()?;
        log::debug!(
            "Page {}: {} matches, {} regions, {} missed",
            report.page,
            report.matches,
            report.regions,
            report.missed
        );
        Ok(report)
    }

    /// Redact every selected page of a loaded document, in order.
    pub fn redact_document(&self, doc: &mut PdfDocument) -> Result<Vec<PageReport>> {
        let source = doc.path().map(Path::to_path_buf);
        let mut reports = Vec::new();

        for number in doc.page_numbers() {
            if !self.options.pages.includes(number) {
                continue;
            }
            let mut page = doc.page(number)?;
            let ocr = self.prepare_page(&mut page, source.as_deref())?;
            let mut report = self.redact_page(&mut page)?;
            report.ocr = ocr;
            reports.push(report);
        }

        Ok(reports)
    }

    /// Redact `input` into `output`.
    pub fn redact_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<DocumentReport> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let started_at = Utc::now();

        let mut doc = PdfDocument::open(input)?;
        log::info!(
            "Redacting {} ({}, {} pages)",
            input.display(),
            doc.format(),
            doc.page_count()
        );
        let pages = self.redact_document(&mut doc)?;
        doc.save(output)?;

        let report = DocumentReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            pages,
            started_at,
            finished_at: Utc::now(),
        };
        log::info!(
            "Saved {}: {} matches, {} regions",
            output.display(),
            report.total_matches(),
            report.total_regions()
        );
        Ok(report)
    }

    /// Findings on every selected page of `input`; nothing is written.
    pub fn scan_file<P: AsRef<Path>>(&self, input: P) -> Result<Vec<Finding>> {
        let input = input.as_ref();
        let mut doc = PdfDocument::open(input)?;
        let mut findings = Vec::new();

        for number in doc.page_numbers() {
            if !self.options.pages.includes(number) {
                continue;
            }
            let mut page = doc.page(number)?;
            self.prepare_page(&mut page, Some(input))?;
            findings.extend(self.scan_page(&page));
        }

        Ok(findings)
    }

    /// Swap in an OCR text layer when forced or when the page has no text.
    ///
    /// Returns whether OCR was used.
    fn prepare_page(&self, page: &mut PdfPage<'_>, source: Option<&Path>) -> Result<bool> {
        let number = page.number();
        let forced = self.options.force_ocr;
        if !forced && (page.has_native_text() || !self.options.ocr_fallback) {
            return Ok(false);
        }

        let Some(engine) = &self.ocr else {
            if forced {
                return Err(Error::OcrUnavailable("no OCR engine configured".to_string()));
            }
            log::debug!("Page {} has no text layer and OCR is not configured", number);
            return Ok(false);
        };
        let source = source.ok_or_else(|| Error::Ocr {
            page: number,
            reason: "document was not loaded from a file".to_string(),
        })?;

        let recognized = match engine.recognize(source, number) {
            Ok(recognized) => recognized,
            Err(Error::OcrUnavailable(tool)) if !forced => {
                log::warn!("Page {} has no text layer and {} is not available", number, tool);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let (width, height) = page.size();
        let layer = recognized.to_text_layer(width, height, self.options.min_ocr_confidence);
        log::info!("Page {}: using OCR text layer", number);
        page.replace_text_layer(layer);
        Ok(true)
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(RedactOptions::default())
    }
}

/// Page text as the pattern catalog sees it: lines joined by single spaces, NFC.
pub fn flatten(text: &str) -> String {
    text.split('\n').collect::<Vec<_>>().join(" ").nfc().collect()
}
