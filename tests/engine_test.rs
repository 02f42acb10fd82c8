//! Engine behavior against a scripted page.

use std::collections::HashMap;

use tarja::redact::{Fill, GroupHit, Located, MaskRegion};
use tarja::{FillStyle, IdentifierType, RedactOptions, Rect, RedactionPage, Redactor};

/// A page whose text and search results are given up front.
#[derive(Default)]
struct MockPage {
    text: String,
    hits: HashMap<String, Vec<Rect>>,
    pending: Vec<MaskRegion>,
    applied: Vec<MaskRegion>,
}

impl MockPage {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    fn with_hit(mut self, needle: &str, rect: Rect) -> Self {
        self.hits.entry(needle.to_string()).or_default().push(rect);
        self
    }
}

impl RedactionPage for MockPage {
    fn number(&self) -> u32 {
        1
    }

    fn size(&self) -> (f32, f32) {
        (612.0, 792.0)
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn search_for(&self, needle: &str) -> Vec<Rect> {
        self.hits.get(needle).cloned().unwrap_or_default()
    }

    fn add_redaction(&mut self, region: MaskRegion) {
        self.pending.push(region);
    }

    fn apply_redactions(&mut self) -> tarja::Result<usize> {
        let applied = self.pending.len();
        self.applied.append(&mut self.pending);
        Ok(applied)
    }
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn test_end_to_end_partial_cpf() {
    let text = "Nome: João. CPF: 529.982.247-25. Valor: R$ 1.234,56.";
    // 14 characters at 6pt each
    let number = Rect::new(100.0, 700.0, 184.0, 712.0);
    let mut page = MockPage::new(text).with_hit("529.982.247-25", number);

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 1);
    assert_eq!(report.regions, 2);
    assert_eq!(report.missed, 0);
    assert_eq!(report.by_type.get(&IdentifierType::Cpf), Some(&1));

    let head = page.applied[0].rect;
    assert!(approx(head.x0, 100.0));
    assert!(approx(head.x1, 118.0));
    let tail = page.applied[1].rect;
    assert!(approx(tail.x0, 172.0));
    assert!(approx(tail.x1, 184.0));
    assert!(page.applied.iter().all(|r| r.fill == Fill::Black));
}

#[test]
fn test_unformatted_cpf_masks_same_digits() {
    // 11 characters at 6pt each
    let number = Rect::new(50.0, 400.0, 116.0, 410.0);
    let mut page = MockPage::new("CPF 52998224725").with_hit("52998224725", number);

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.regions, 2);
    assert!(approx(page.applied[0].rect.x1, 68.0));
    assert!(approx(page.applied[1].rect.x0, 104.0));
}

#[test]
fn test_currency_context_never_redacted() {
    let mut page = MockPage::new("Total: R$ 529.982.247-25")
        .with_hit("529.982.247-25", Rect::new(100.0, 700.0, 184.0, 712.0));

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 0);
    assert!(page.applied.is_empty());
}

#[test]
fn test_cnpj_never_redacted() {
    let mut page = MockPage::new("Contratante CNPJ 11.222.333/0001-81")
        .with_hit("11.222.333", Rect::new(100.0, 700.0, 160.0, 712.0));

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 0);
    assert!(page.applied.is_empty());
}

#[test]
fn test_multiline_cpf_group_fallback() {
    // The number wraps: "123" ends one line, "456789" and "09" start the next
    let mut page = MockPage::new("Declaro que meu CPF é 123\n456789 09, conforme.")
        .with_hit("123", Rect::new(500.0, 700.0, 518.0, 712.0))
        .with_hit("456789", Rect::new(72.0, 686.0, 108.0, 698.0))
        .with_hit("09", Rect::new(114.0, 686.0, 126.0, 698.0));

    let redactor = Redactor::default();
    let findings = redactor.scan_page(&page);
    assert_eq!(findings.len(), 1);
    match &findings[0].located {
        Located::Groups(groups) => {
            let found: Vec<usize> = groups.iter().map(|g: &GroupHit| g.group).collect();
            assert_eq!(found, vec![0, 3]);
        }
        other => panic!("expected group hits, got {:?}", other),
    }

    let report = redactor.redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 1);
    assert_eq!(report.missed, 0);
    assert_eq!(report.regions, 2);
    assert_eq!(page.applied[0].rect, Rect::new(500.0, 700.0, 518.0, 712.0));
    assert_eq!(page.applied[1].rect, Rect::new(114.0, 686.0, 126.0, 698.0));
}

#[test]
fn test_tall_hit_uses_groups() {
    // One search hit spanning two lines
    let mut page = MockPage::new("CPF 123 456 789 09")
        .with_hit("123 456 789 09", Rect::new(72.0, 686.0, 540.0, 712.0))
        .with_hit("123", Rect::new(500.0, 700.0, 518.0, 712.0))
        .with_hit("09", Rect::new(114.0, 686.0, 126.0, 698.0));

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.regions, 2);
    assert_eq!(page.applied[0].rect.x0, 500.0);
    assert_eq!(page.applied[1].rect.x0, 114.0);
}

#[test]
fn test_tall_hit_without_groups_is_missed() {
    // The only hit spans two lines and no group can be found alone
    let mut page = MockPage::new("CPF 123 456 789 09")
        .with_hit("123 456 789 09", Rect::new(72.0, 686.0, 540.0, 712.0));

    let redactor = Redactor::default();
    let findings = redactor.scan_page(&page);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].located, Located::Missed);
    assert!(findings[0].regions.is_empty());

    let report = redactor.redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 1);
    assert_eq!(report.missed, 1);
    assert_eq!(report.regions, 0);
    assert!(page.applied.is_empty());
}

#[test]
fn test_hit_at_line_break_height_stays_whole() {
    let hit = Rect::new(100.0, 700.0, 184.0, 715.0);
    let page = MockPage::new("CPF: 529.982.247-25")
        .with_hit("529.982.247-25", hit)
        .with_hit("529", Rect::new(100.0, 700.0, 118.0, 712.0))
        .with_hit("25", Rect::new(172.0, 700.0, 184.0, 712.0));

    let findings = Redactor::default().scan_page(&page);
    assert_eq!(findings[0].located, Located::Whole(hit));
}

#[test]
fn test_cnh_passing_cpf_checksum_masked_whole() {
    // 01234567890 also has valid CPF check digits
    let rect = Rect::new(100.0, 700.0, 166.0, 712.0);
    let mut page = MockPage::new("CNH 01234567890").with_hit("01234567890", rect);

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 1);
    assert_eq!(report.by_type.get(&IdentifierType::DriversLicense), Some(&1));
    assert_eq!(report.by_type.get(&IdentifierType::Cpf), None);
    assert_eq!(page_regions(&page), vec![rect]);
}

#[test]
fn test_cpf_after_unrelated_number_redacted() {
    let number = Rect::new(160.0, 700.0, 244.0, 712.0);
    let mut page =
        MockPage::new("Processo 123 529.982.247-25").with_hit("529.982.247-25", number);

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.by_type.get(&IdentifierType::Cpf), Some(&1));
    assert_eq!(report.regions, 2);
}

#[test]
fn test_geometry_miss_counted() {
    let mut page = MockPage::new("CPF: 529.982.247-25");

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.matches, 1);
    assert_eq!(report.missed, 1);
    assert_eq!(report.regions, 0);
}

#[test]
fn test_repeated_number_takes_nth_hit() {
    let first = Rect::new(100.0, 700.0, 184.0, 712.0);
    let second = Rect::new(100.0, 600.0, 184.0, 612.0);
    let mut page = MockPage::new("CPF: 529.982.247-25\nCPF: 529.982.247-25")
        .with_hit("529.982.247-25", first)
        .with_hit("529.982.247-25", second);

    let findings = Redactor::default().scan_page(&page);
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].located, Located::Whole(first));
    assert_eq!(findings[1].located, Located::Whole(second));

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.regions, 4);
}

#[test]
fn test_rg_masked_totally() {
    let rect = Rect::new(100.0, 700.0, 160.0, 712.0);
    let mut page = MockPage::new("RG: 12345678-9").with_hit("12345678-9", rect);

    let report = Redactor::default().redact_page(&mut page).unwrap();
    assert_eq!(report.by_type.get(&IdentifierType::Rg), Some(&1));
    assert_eq!(page.applied.len(), 1);
    assert_eq!(page.applied[0].rect, rect);
}

#[test]
fn test_overlay_fill_carries_masked_text() {
    let mut page = MockPage::new("CPF: 529.982.247-25")
        .with_hit("529.982.247-25", Rect::new(100.0, 700.0, 184.0, 712.0));
    let options = RedactOptions::new().with_fill(FillStyle::Overlay { mask_char: 'X' });

    let redactor = Redactor::new(options);
    let findings = redactor.scan_page(&page);
    assert_eq!(findings[0].masked, "XXX.982.247-XX");

    redactor.redact_page(&mut page).unwrap();
    let texts: Vec<_> = page
        .applied
        .iter()
        .map(|r| match &r.fill {
            Fill::Overlay { text } => text.clone(),
            Fill::Black => String::new(),
        })
        .collect();
    assert_eq!(texts, vec!["XXX", "XX"]);
}

#[test]
fn test_voter_title_requires_keyword() {
    let rect = Rect::new(100.0, 700.0, 184.0, 712.0);
    let mut plain = MockPage::new("Protocolo 1234 5678 9012").with_hit("1234 5678 9012", rect);
    let mut labelled =
        MockPage::new("Título de eleitor: 1234 5678 9012").with_hit("1234 5678 9012", rect);

    let redactor = Redactor::default();
    assert_eq!(redactor.redact_page(&mut plain).unwrap().matches, 0);
    let report = redactor.redact_page(&mut labelled).unwrap();
    assert_eq!(report.by_type.get(&IdentifierType::VoterTitle), Some(&1));
    assert_eq!(page_regions(&labelled), vec![rect]);
}

fn page_regions(page: &MockPage) -> Vec<Rect> {
    page.applied.iter().map(|r| r.rect).collect()
}
