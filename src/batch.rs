//! Directory-level batch redaction.
//!
//! Every `*.pdf` in the input directory is redacted into the output
//! directory under the same file name. A failing document is reported and
//! the batch moves on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::redact::{DocumentReport, Redactor};

/// Progress notifications sent while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// Inputs were enumerated.
    Queued {
        /// Number of documents to process
        total: usize,
    },
    /// A worker picked up a document.
    Started {
        /// Source file
        input: PathBuf,
    },
    /// A document finished, successfully or not.
    Finished(DocumentOutcome),
}

/// Result of one document in a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Redacted and saved
    Redacted(DocumentReport),
    /// Not written
    Failed {
        /// Source file
        input: PathBuf,
        /// What went wrong
        error: String,
    },
}

impl DocumentOutcome {
    /// Source file of the document.
    pub fn input(&self) -> &Path {
        match self {
            DocumentOutcome::Redacted(report) => &report.input,
            DocumentOutcome::Failed { input, .. } => input,
        }
    }

    /// Check whether the document was written.
    pub fn is_success(&self) -> bool {
        matches!(self, DocumentOutcome::Redacted(_))
    }
}

/// Everything that happened in one batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Per-document outcomes
    pub documents: Vec<DocumentOutcome>,
    /// When the batch began
    pub started_at: DateTime<Utc>,
    /// When the last document finished
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Documents written.
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.is_success()).count()
    }

    /// Documents that failed.
    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    /// Validated identifiers over all written documents.
    pub fn total_matches(&self) -> usize {
        self.reports().map(DocumentReport::total_matches).sum()
    }

    /// Applied regions over all written documents.
    pub fn total_regions(&self) -> usize {
        self.reports().map(DocumentReport::total_regions).sum()
    }

    /// Geometry misses over all written documents.
    pub fn total_missed(&self) -> usize {
        self.reports().map(DocumentReport::total_missed).sum()
    }

    fn reports(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter_map(|d| match d {
            DocumentOutcome::Redacted(report) => Some(report),
            DocumentOutcome::Failed { .. } => None,
        })
    }
}

/// PDF files directly inside `dir`, sorted by name.
///
/// The extension check ignores case; subdirectories are not entered.
pub fn find_inputs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "input directory not found: {}",
            dir.display()
        )));
    }

    let mut inputs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    inputs.sort();
    Ok(inputs)
}

/// Redact every PDF in `input_dir` into `output_dir`.
///
/// The output directory is created if needed. Only enumeration and directory
/// creation can fail the whole batch; per-document failures end up in the
/// report. Progress is sent to `events` when given; a dropped receiver is
/// ignored.
pub fn redact_dir<P: AsRef<Path>, Q: AsRef<Path>>(
    redactor: &Redactor,
    input_dir: P,
    output_dir: Q,
    events: Option<&Sender<BatchEvent>>,
) -> Result<BatchReport> {
    let output_dir = output_dir.as_ref();
    let inputs = find_inputs(input_dir)?;
    fs::create_dir_all(output_dir)?;

    let started_at = Utc::now();
    let notify = |event: BatchEvent| {
        if let Some(tx) = events {
            let _ = tx.send(event);
        }
    };
    notify(BatchEvent::Queued {
        total: inputs.len(),
    });
    log::info!(
        "Batch: {} documents into {}",
        inputs.len(),
        output_dir.display()
    );

    let process = |input: &PathBuf| {
        notify(BatchEvent::Started {
            input: input.clone(),
        });
        let outcome = redact_one(redactor, input, output_dir);
        notify(BatchEvent::Finished(outcome.clone()));
        outcome
    };

    let documents: Vec<DocumentOutcome> = if redactor.options().parallel {
        inputs.par_iter().map(process).collect()
    } else {
        inputs.iter().map(process).collect()
    };

    let report = BatchReport {
        documents,
        started_at,
        finished_at: Utc::now(),
    };
    log::info!(
        "Batch done: {} redacted, {} failed",
        report.succeeded(),
        report.failed()
    );
    Ok(report)
}

fn redact_one(redactor: &Redactor, input: &Path, output_dir: &Path) -> DocumentOutcome {
    let Some(name) = input.file_name() else {
        return DocumentOutcome::Failed {
            input: input.to_path_buf(),
            error: "input has no file name".to_string(),
        };
    };

    match redactor.redact_file(input, output_dir.join(name)) {
        Ok(report) => DocumentOutcome::Redacted(report),
        Err(e) => {
            log::error!("Failed to redact {}: {}", input.display(), e);
            DocumentOutcome::Failed {
                input: input.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.bak"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let inputs = find_inputs(dir.path()).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_find_inputs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_inputs(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let outcome = DocumentOutcome::Failed {
            input: PathBuf::from("in/x.pdf"),
            error: "Document is encrypted".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "Document is encrypted");
        assert!(!outcome.is_success());
        assert_eq!(outcome.input(), Path::new("in/x.pdf"));
    }
}
