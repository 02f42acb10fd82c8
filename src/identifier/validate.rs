//! Digit-count and checksum validation.

use super::{IdentifierType, Rejection};

/// Keep only the ASCII digits of `text`.
pub fn digits_of(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Check a CPF digit string: 11 digits, not all identical, both check digits valid.
///
/// # Example
///
/// ```
/// use tarja::identifier::is_valid_cpf;
///
/// assert!(is_valid_cpf("11144477735"));
/// assert!(!is_valid_cpf("11111111111"));
/// ```
pub fn is_valid_cpf(digits: &str) -> bool {
    check_cpf(digits).is_ok()
}

pub(crate) fn check_cpf(digits: &str) -> Result<(), Rejection> {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if values.len() != 11 || digits.len() != 11 {
        return Err(Rejection::DigitCount {
            found: values.len(),
        });
    }
    if values.iter().all(|&d| d == values[0]) {
        return Err(Rejection::RepeatedDigits);
    }

    if cpf_check_digit(&values[..9]) != values[9] || cpf_check_digit(&values[..10]) != values[10]
    {
        return Err(Rejection::Checksum);
    }
    Ok(())
}

/// Weighted mod-11 check digit over `prefix`, weights counting down to 2.
fn cpf_check_digit(prefix: &[u32]) -> u32 {
    let top = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    let digit = 11 - sum % 11;
    if digit >= 10 {
        0
    } else {
        digit
    }
}

pub(crate) fn check_length(kind: IdentifierType, digits: &str) -> Result<(), Rejection> {
    if kind.digit_range().contains(&digits.len()) {
        Ok(())
    } else {
        Err(Rejection::DigitCount {
            found: digits.len(),
        })
    }
}

pub(crate) fn check_required_context(kind: IdentifierType, window: &str) -> Result<(), Rejection> {
    let required = kind.required_context();
    if required.is_empty() || required.iter().any(|k| window.contains(k)) {
        Ok(())
    } else {
        Err(Rejection::MissingContext)
    }
}

/// RG: length in range, or an explicit "rg" in the window.
pub(crate) fn check_rg(digits: &str, window: &str) -> Result<(), Rejection> {
    if window.contains("rg") {
        return Ok(());
    }
    check_length(IdentifierType::Rg, digits)
}
