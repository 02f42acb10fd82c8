//! Regular-expression matchers for each identifier type.

use std::ops::Range;

use regex::{Captures, Regex};

use super::validate::{check_cpf, check_length, check_required_context, check_rg};
use super::{Candidate, Identifier, IdentifierType, Rejection};

/// Optional "nº" marker after a label.
const NUMBER_MARK: &str = r"(?:n[º°o]\.?\s*)?";

/// CPF: 3+3+3+2 digits with any mix of spaces, dots, hyphens or slashes between groups.
pub struct CpfIdentifier {
    regex: Regex,
}

impl CpfIdentifier {
    /// Compile the CPF pattern.
    pub fn new() -> Self {
        let pattern = format!(
            r"(?i)(?:(?:cpf|n[º°o])\s*[:.]?\s*{})?(\d{{3}})[\s./-]*(\d{{3}})[\s./-]*(\d{{3}})[\s./-]*(\d{{2}})",
            NUMBER_MARK
        );
        Self {
            regex: Regex::new(&pattern).expect("CPF pattern is valid"),
        }
    }
}

impl Default for CpfIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Identifier for CpfIdentifier {
    fn kind(&self) -> IdentifierType {
        IdentifierType::Cpf
    }

    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Candidate> + 't> {
        Box::new(bounded_candidates(&self.regex, text, self.kind()))
    }

    fn validate(&self, digits: &str, _window: &str) -> Result<(), Rejection> {
        check_cpf(digits)
    }
}

/// RG: 1-2 digits, 3 digits, 3 digits, optional check character (digit or X).
///
/// The pattern has no capture groups; only the digit count is checked.
pub struct RgIdentifier {
    regex: Regex,
}

impl RgIdentifier {
    /// Compile the RG pattern.
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"\d{1,2}\.?\d{3}\.?\d{3}-?[\dXx]?").expect("RG pattern is valid"),
        }
    }
}

impl Default for RgIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Identifier for RgIdentifier {
    fn kind(&self) -> IdentifierType {
        IdentifierType::Rg
    }

    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Candidate> + 't> {
        Box::new(bounded_candidates(&self.regex, text, self.kind()))
    }

    fn validate(&self, digits: &str, window: &str) -> Result<(), Rejection> {
        check_rg(digits, window)
    }
}

/// Título de eleitor: three 4-digit groups, with an optional leading label.
pub struct VoterTitleIdentifier {
    regex: Regex,
}

impl VoterTitleIdentifier {
    /// Compile the voter-title pattern.
    pub fn new() -> Self {
        let pattern = format!(
            r"(?i)(?:t[íi]tulo(?:\s+(?:de\s+)?eleito(?:r|ral))?\s*[:.]?\s*{})?(\d{{4}})[\s-]*(\d{{4}})[\s-]*(\d{{4}})",
            NUMBER_MARK
        );
        Self {
            regex: Regex::new(&pattern).expect("voter title pattern is valid"),
        }
    }
}

impl Default for VoterTitleIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Identifier for VoterTitleIdentifier {
    fn kind(&self) -> IdentifierType {
        IdentifierType::VoterTitle
    }

    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Candidate> + 't> {
        Box::new(bounded_candidates(&self.regex, text, self.kind()))
    }

    fn validate(&self, digits: &str, window: &str) -> Result<(), Rejection> {
        check_length(self.kind(), digits)?;
        check_required_context(self.kind(), window)
    }
}

/// CNH: the label followed by exactly 11 digits; only the digits are captured.
pub struct DriversLicenseIdentifier {
    regex: Regex,
}

impl DriversLicenseIdentifier {
    /// Compile the driver's-license pattern.
    pub fn new() -> Self {
        let pattern = format!(
            r"(?i)(?:cnh|carteira\s+nacional\s+de\s+habilita[çc][ãa]o)\s*{}[:.\-]?\s*(\d{{11}})",
            NUMBER_MARK
        );
        Self {
            regex: Regex::new(&pattern).expect("CNH pattern is valid"),
        }
    }
}

impl Default for DriversLicenseIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Identifier for DriversLicenseIdentifier {
    fn kind(&self) -> IdentifierType {
        IdentifierType::DriversLicense
    }

    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Candidate> + 't> {
        Box::new(bounded_candidates(&self.regex, text, self.kind()))
    }

    fn validate(&self, digits: &str, _window: &str) -> Result<(), Rejection> {
        check_length(self.kind(), digits)
    }
}

/// Leftmost hits whose digits are not glued to another digit run.
///
/// A glued hit does not consume its text: the search resumes one character
/// after its start, so "123 529.982.247-25" still yields the CPF.
fn bounded_candidates<'t>(
    regex: &'t Regex,
    text: &'t str,
    kind: IdentifierType,
) -> impl Iterator<Item = Candidate> + 't {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < text.len() {
            let caps = regex.captures_at(text, pos)?;
            let whole = caps.get(0)?;
            match candidate_from_captures(&caps, text, kind) {
                Some(candidate) => {
                    pos = whole.end().max(whole.start() + 1);
                    return Some(candidate);
                }
                None => pos = next_char_boundary(text, whole.start()),
            }
        }
        None
    })
}

/// The candidate spans the capture groups, or the whole hit when there are none.
fn candidate_from_captures(caps: &Captures<'_>, text: &str, kind: IdentifierType) -> Option<Candidate> {
    let groups: Vec<_> = caps.iter().skip(1).flatten().collect();
    let (start, end) = match (groups.first(), groups.last()) {
        (Some(first), Some(last)) => (first.start(), last.end()),
        _ => caps.get(0).map(|m| (m.start(), m.end()))?,
    };
    if !is_digit_bounded(text, start, end) {
        return None;
    }
    Some(Candidate {
        kind,
        text: text[start..end].to_string(),
        start,
        end,
        groups: groups.iter().map(|m| m.as_str().to_string()).collect(),
    })
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    at + text[at..].chars().next().map_or(1, char::len_utf8)
}

/// The span is not glued to a longer digit run on either side.
fn is_digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

/// The set of enabled identifier matchers plus the CNPJ negative pattern.
///
/// Built once and shared by reference; holds no per-page state.
pub struct PatternCatalog {
    identifiers: Vec<Box<dyn Identifier>>,
    cnpj: Regex,
}

impl PatternCatalog {
    /// Catalog with every identifier type enabled.
    pub fn new() -> Self {
        Self::with_types(&IdentifierType::ALL)
    }

    /// Catalog restricted to the given types (kept in priority order).
    pub fn with_types(types: &[IdentifierType]) -> Self {
        let mut types = types.to_vec();
        types.sort();
        types.dedup();

        let identifiers = types
            .into_iter()
            .map(|kind| -> Box<dyn Identifier> {
                match kind {
                    IdentifierType::Cpf => Box::new(CpfIdentifier::new()),
                    IdentifierType::VoterTitle => Box::new(VoterTitleIdentifier::new()),
                    IdentifierType::DriversLicense => Box::new(DriversLicenseIdentifier::new()),
                    IdentifierType::Rg => Box::new(RgIdentifier::new()),
                }
            })
            .collect();

        Self {
            identifiers,
            cnpj: Regex::new(r"\d{2}\.?\d{3}\.?\d{3}/\d{4}-?\d{2}").expect("CNPJ pattern is valid"),
        }
    }

    /// Enabled matchers in priority order.
    pub fn identifiers(&self) -> impl Iterator<Item = &dyn Identifier> {
        self.identifiers.iter().map(|i| i.as_ref())
    }

    /// The matcher for one type, if enabled.
    pub fn get(&self, kind: IdentifierType) -> Option<&dyn Identifier> {
        self.identifiers().find(|i| i.kind() == kind)
    }

    /// Byte ranges of CNPJ-shaped numbers.
    pub fn cnpj_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.cnpj.find_iter(text).map(|m| m.range()).collect()
    }

    /// All candidates in `text`, type by type in priority order.
    ///
    /// CPF and RG candidates overlapping a CNPJ are never produced.
    pub fn candidates<'t>(&'t self, text: &'t str) -> impl Iterator<Item = Candidate> + 't {
        let cnpj = self.cnpj_spans(text);
        self.identifiers
            .iter()
            .flat_map(move |identifier| identifier.find(text))
            .filter(move |c| {
                !(matches!(c.kind, IdentifierType::Cpf | IdentifierType::Rg)
                    && cnpj.iter().any(|r| c.start < r.end && r.start < c.end))
            })
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PatternCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternCatalog")
            .field(
                "identifiers",
                &self.identifiers().map(|i| i.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
