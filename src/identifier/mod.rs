//! Brazilian personal identifiers: types, candidates and the matching contract.
//!
//! Every identifier type is matched, validated and masked through the
//! [`Identifier`] trait. The [`PatternCatalog`] owns one implementation per
//! enabled type and produces [`Candidate`]s from flattened page text; the
//! [`ContextFilter`] and the per-type validators turn those into
//! [`ValidatedMatch`]es.

mod catalog;
mod context;
mod validate;

pub use catalog::{
    CpfIdentifier, DriversLicenseIdentifier, PatternCatalog, RgIdentifier, VoterTitleIdentifier,
};
pub use context::{ContextConfig, ContextFilter};
pub use validate::{digits_of, is_valid_cpf};

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The identifier types the engine recognizes.
///
/// Declaration order is the priority used when matches of different types
/// overlap. The label-bound, fully masked types come first, so an 11-digit
/// number after "CNH" stays a license even when it also passes the CPF
/// checksum; a CPF wins over an RG-shaped fragment inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierType {
    /// Carteira Nacional de Habilitação, 11 digits
    DriversLicense,
    /// Título de eleitor, 12 digits
    VoterTitle,
    /// Cadastro de Pessoas Físicas, 11 digits with two check digits
    Cpf,
    /// Registro Geral, 7 to 9 digits
    Rg,
}

impl IdentifierType {
    /// All identifier types in priority order.
    pub const ALL: [IdentifierType; 4] = [
        IdentifierType::DriversLicense,
        IdentifierType::VoterTitle,
        IdentifierType::Cpf,
        IdentifierType::Rg,
    ];

    /// Short display label.
    pub fn label(&self) -> &'static str {
        match self {
            IdentifierType::Cpf => "CPF",
            IdentifierType::VoterTitle => "Título de eleitor",
            IdentifierType::DriversLicense => "CNH",
            IdentifierType::Rg => "RG",
        }
    }

    /// Accepted digit-string lengths.
    pub fn digit_range(&self) -> RangeInclusive<usize> {
        match self {
            IdentifierType::Cpf => 11..=11,
            IdentifierType::VoterTitle => 12..=12,
            IdentifierType::DriversLicense => 11..=11,
            IdentifierType::Rg => 7..=9,
        }
    }

    /// Which digits get hidden.
    pub fn mask_policy(&self) -> MaskPolicy {
        match self {
            IdentifierType::Cpf => MaskPolicy::Partial { head: 3, tail: 2 },
            _ => MaskPolicy::Total,
        }
    }

    /// Keywords of which at least one must appear in the context window.
    ///
    /// An empty slice means no context is required.
    pub fn required_context(&self) -> &'static [&'static str] {
        match self {
            IdentifierType::VoterTitle => &["títul", "titul", "eleitor"],
            _ => &[],
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IdentifierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpf" => Ok(IdentifierType::Cpf),
            "rg" => Ok(IdentifierType::Rg),
            "titulo" | "título" | "voter-title" | "voter_title" => Ok(IdentifierType::VoterTitle),
            "cnh" | "drivers-license" | "drivers_license" => Ok(IdentifierType::DriversLicense),
            other => Err(format!("unknown identifier type: {}", other)),
        }
    }
}

/// Which digit positions of a matched number are hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskPolicy {
    /// Hide the first `head` and the last `tail` characters only
    Partial {
        /// Leading characters hidden
        head: usize,
        /// Trailing characters hidden
        tail: usize,
    },
    /// Hide the whole number
    Total,
}

/// One attempted match in the flattened text of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Identifier type of the pattern that produced the hit
    pub kind: IdentifierType,
    /// The number as it appears in the text, labels excluded
    pub text: String,
    /// Byte offset of the number in the flattened text
    pub start: usize,
    /// Byte offset one past the end of the number
    pub end: usize,
    /// Captured digit groups in order (empty for patterns without groups)
    pub groups: Vec<String>,
}

impl Candidate {
    /// The candidate's digits with every other character removed.
    pub fn digits(&self) -> String {
        digits_of(&self.text)
    }
}

/// A candidate that passed digit, checksum and context checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedMatch {
    /// Identifier type
    pub kind: IdentifierType,
    /// Pure digit string
    pub digits: String,
    /// The number as it appears on the page, used for geometry lookup
    pub text: String,
    /// Byte offset in the flattened text
    pub start: usize,
    /// Byte offset one past the end
    pub end: usize,
    /// Captured digit groups in order
    pub groups: Vec<String>,
}

impl ValidatedMatch {
    pub(crate) fn from_candidate(candidate: Candidate, digits: String) -> Self {
        Self {
            kind: candidate.kind,
            digits,
            text: candidate.text,
            start: candidate.start,
            end: candidate.end,
            groups: candidate.groups,
        }
    }

    /// Check whether two matches share any byte of the flattened text.
    pub fn overlaps(&self, other: &ValidatedMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Digit count outside the type's range
    DigitCount {
        /// Digits found
        found: usize,
    },
    /// All digits identical
    RepeatedDigits,
    /// Check digits do not match
    Checksum,
    /// A required keyword is missing from the context window
    MissingContext,
    /// An ignore keyword was found in the context window
    IgnoredKeyword(String),
    /// Looks like a currency amount
    CurrencyAmount,
    /// Looks like the tail of a CNPJ
    CnpjFragment,
    /// Overlaps a match of a higher-priority type
    Overlap(IdentifierType),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::DigitCount { found } => write!(f, "unexpected digit count {}", found),
            Rejection::RepeatedDigits => f.write_str("all digits identical"),
            Rejection::Checksum => f.write_str("check digits do not match"),
            Rejection::MissingContext => f.write_str("required keyword missing"),
            Rejection::IgnoredKeyword(k) => write!(f, "preceded by ignore keyword {:?}", k),
            Rejection::CurrencyAmount => f.write_str("currency amount"),
            Rejection::CnpjFragment => f.write_str("CNPJ fragment"),
            Rejection::Overlap(kind) => write!(f, "overlaps a {} match", kind),
        }
    }
}

/// Matching, validation and masking rules for one identifier type.
pub trait Identifier: Send + Sync {
    /// The type this implementation handles.
    fn kind(&self) -> IdentifierType;

    /// Lazily yield every non-overlapping hit in `text`.
    fn find<'t>(&'t self, text: &'t str) -> Box<dyn Iterator<Item = Candidate> + 't>;

    /// Accept or reject a digit string given the lower-cased context window.
    fn validate(&self, digits: &str, window: &str) -> Result<(), Rejection>;

    /// Which digits get hidden.
    fn mask_policy(&self) -> MaskPolicy {
        self.kind().mask_policy()
    }
}
