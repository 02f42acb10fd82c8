//! Directory batches: per-file outcomes, progress events, failures.

use std::fs;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tarja::{redact_dir, BatchEvent, DocumentOutcome, RedactOptions, Redactor};

fn write_pdf(path: &Path, text: &str) {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![100.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[test]
fn test_batch_redacts_each_file() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("redacted");

    write_pdf(&input.path().join("a.pdf"), "CPF: 529.982.247-25");
    write_pdf(&input.path().join("B.PDF"), "RG: 12345678-9");
    fs::write(input.path().join("notes.txt"), "CPF: 529.982.247-25").unwrap();

    let report = redact_dir(&Redactor::default(), input.path(), &out_dir, None).unwrap();
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.total_matches(), 2);
    // Two CPF cells plus one RG box
    assert_eq!(report.total_regions(), 3);

    assert!(out_dir.join("a.pdf").exists());
    assert!(out_dir.join("B.PDF").exists());
    assert!(!out_dir.join("notes.txt").exists());
}

#[test]
fn test_batch_continues_after_failure() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    write_pdf(&input.path().join("good.pdf"), "CPF: 529.982.247-25");
    fs::write(input.path().join("broken.pdf"), b"%PDF-1.4\nnot really").unwrap();

    let redactor = Redactor::new(RedactOptions::new().sequential());
    let report = redact_dir(&redactor, input.path(), output.path(), None).unwrap();
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);

    let failed = report
        .documents
        .iter()
        .find(|d| !d.is_success())
        .unwrap();
    assert_eq!(failed.input().file_name().unwrap(), "broken.pdf");
    assert!(!output.path().join("broken.pdf").exists());
    assert!(output.path().join("good.pdf").exists());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["documents"][0]["status"], "failed");
    assert_eq!(json["documents"][1]["status"], "redacted");
}

#[test]
fn test_batch_sends_progress_events() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for name in ["one.pdf", "two.pdf", "three.pdf"] {
        write_pdf(&input.path().join(name), "sem identificadores");
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let report = redact_dir(&Redactor::default(), input.path(), output.path(), Some(&tx)).unwrap();
    drop(tx);
    assert_eq!(report.succeeded(), 3);

    let events: Vec<BatchEvent> = rx.iter().collect();
    assert!(matches!(events.first(), Some(BatchEvent::Queued { total: 3 })));
    let started = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::Started { .. }))
        .count();
    let finished = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::Finished(DocumentOutcome::Redacted(_))))
        .count();
    assert_eq!(started, 3);
    assert_eq!(finished, 3);
}

#[test]
fn test_batch_missing_input_dir() {
    let output = tempfile::tempdir().unwrap();
    let result = redact_dir(
        &Redactor::default(),
        output.path().join("nope"),
        output.path(),
        None,
    );
    assert!(result.is_err());
}

#[test]
fn test_batch_empty_dir() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let report = redact_dir(&Redactor::default(), input.path(), output.path(), None).unwrap();
    assert!(report.documents.is_empty());
    assert_eq!(report.succeeded(), 0);
}
