//! Lexical look-behind / look-ahead filtering of candidates.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{digits_of, Candidate, IdentifierType, Rejection};

/// Keyword lists and window sizes for the context filter.
///
/// Defaults reproduce the thresholds the engine was tuned with; a different
/// jurisdiction or form layout can load its own lists from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Characters inspected before a candidate
    pub window_chars: usize,

    /// Characters inspected after a CPF/RG candidate for a CNPJ tail
    pub lookahead_chars: usize,

    /// Any of these in the window rejects the candidate
    pub ignore_keywords: Vec<String>,

    /// Dotted or comma'd numbers with fewer digits are treated as money
    pub currency_min_digits: usize,

    /// Label that overrides the CNPJ-tail heuristic for CPF
    pub cpf_label: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_chars: 30,
            lookahead_chars: 20,
            ignore_keywords: ["r$", "cnpj", "id", "c/c", "matrícula:"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            currency_min_digits: 10,
            cpf_label: "cpf".to_string(),
        }
    }
}

impl ContextConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Rejects candidates whose surroundings mark them as something else.
#[derive(Debug, Clone)]
pub struct ContextFilter {
    config: ContextConfig,
    cnpj_tail: Regex,
}

impl ContextFilter {
    /// Create a filter; keywords are lower-cased once here.
    pub fn new(mut config: ContextConfig) -> Self {
        for keyword in &mut config.ignore_keywords {
            *keyword = keyword.to_lowercase();
        }
        config.cpf_label = config.cpf_label.to_lowercase();

        Self {
            config,
            cnpj_tail: Regex::new(r"^/\d{4}(?:-\d{2})?").expect("CNPJ tail pattern is valid"),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The lower-cased characters immediately preceding byte offset `start`.
    pub fn window(&self, text: &str, start: usize) -> String {
        let before = &text[..start];
        let skip = before
            .chars()
            .count()
            .saturating_sub(self.config.window_chars);
        before.chars().skip(skip).collect::<String>().to_lowercase()
    }

    /// Up to `lookahead_chars` characters after byte offset `end`, whitespace removed.
    pub fn lookahead(&self, text: &str, end: usize) -> String {
        text[end..]
            .chars()
            .take(self.config.lookahead_chars)
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    /// Check a candidate against its surroundings.
    ///
    /// On success returns the context window, which the type validators
    /// consult for their own keyword rules.
    pub fn check(&self, candidate: &Candidate, text: &str) -> Result<String, Rejection> {
        let window = self.window(text, candidate.start);

        if let Some(keyword) = self
            .config
            .ignore_keywords
            .iter()
            .find(|k| window.contains(k.as_str()))
        {
            return Err(Rejection::IgnoredKeyword(keyword.clone()));
        }

        if candidate.text.contains([',', '.'])
            && digits_of(&candidate.text).len() < self.config.currency_min_digits
        {
            return Err(Rejection::CurrencyAmount);
        }

        if matches!(candidate.kind, IdentifierType::Cpf | IdentifierType::Rg) {
            let tail = self.lookahead(text, candidate.end);
            let cpf_labelled =
                candidate.kind == IdentifierType::Cpf && window.contains(&self.config.cpf_label);
            if self.cnpj_tail.is_match(&tail) && !cpf_labelled {
                return Err(Rejection::CnpjFragment);
            }
        }

        Ok(window)
    }
}

impl Default for ContextFilter {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}
