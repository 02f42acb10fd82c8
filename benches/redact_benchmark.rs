//! Benchmarks for tarja detection and redaction.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic documents with a known number of identifiers.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const LINES: [&str; 6] = [
    "Contratante: Maria da Silva, CPF: 529.982.247-25, residente nesta cidade.",
    "Documento de identidade RG: 12345678-9 SSP/SP.",
    "Valor total do contrato: R$ 1.234.567,89 em parcelas mensais.",
    "Empresa contratada CNPJ 11.222.333/0001-81.",
    "Título de eleitor: 1234 5678 9012, zona 001.",
    "CNH nº 01234567891 categoria B.",
];

/// Page text with every kind of identifier and near miss, repeated.
fn page_text(repeat: usize) -> String {
    (0..repeat)
        .flat_map(|_| LINES.iter())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// A PDF whose pages each carry `LINES` once.
fn create_test_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::new();
    for _ in 0..page_count {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![50.into(), 750.into()]),
        ];
        for line in LINES {
            let bytes: Vec<u8> = line
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect();
            operations.push(Operation::new("Tj", vec![Object::String(bytes, lopdf::StringFormat::Literal)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut data = Vec::new();
    doc.save_to(&mut data).unwrap();
    data
}

/// Benchmark text scanning at various page lengths.
fn bench_scan_text(c: &mut Criterion) {
    let redactor = tarja::Redactor::default();
    let mut group = c.benchmark_group("scan_text");

    for repeat in [1, 10, 50].iter() {
        let text = tarja::redact::flatten(&page_text(*repeat));
        group.bench_function(format!("{}_blocks", repeat), |b| {
            b.iter(|| redactor.scan_text(black_box(&text)));
        });
    }

    group.finish();
}

/// Benchmark the CPF checksum.
fn bench_cpf_checksum(c: &mut Criterion) {
    c.bench_function("is_valid_cpf", |b| {
        b.iter(|| tarja::is_valid_cpf(black_box("52998224725")));
    });
}

/// Benchmark the full page pipeline: extract, locate, rewrite.
fn bench_redact_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("redact_document");
    let redactor = tarja::Redactor::new(tarja::RedactOptions::new().with_ocr_fallback(false));

    for page_count in [1, 10].iter() {
        let data = create_test_pdf(*page_count);

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| {
                let mut doc = tarja::PdfDocument::from_bytes(black_box(&data)).unwrap();
                redactor.redact_document(&mut doc).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_scan_text,
    bench_cpf_checksum,
    bench_redact_document,
);
criterion_main!(benches);
