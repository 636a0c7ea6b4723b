//! Validation and formatting of report form fields.
//!
//! Messages are French, the language of the reporting form.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Algeria's wilaya codes as used on the report form.
pub const MAX_WILAYA_ID: u32 = 48;

const MAX_INITIALS_LEN: usize = 10;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Algerian mobile numbers: 05, 06 or 07 followed by eight ASCII digits.
/// `\d` would also admit Arabic-Indic and other Unicode digits.
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0[567][0-9]{8}$").unwrap());

/// Two initials only: "K. M.", "K.M." or "K. M".
static INITIALS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[A-Z]\.\s?[A-Z]\.?$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Les initiales sont obligatoires")]
    InitialsMissing,

    #[error("Format invalide (ex: K. M.)")]
    InitialsTooLong,

    #[error("Format requis: \"K. M.\" (initiales uniquement)")]
    InitialsMalformed,
}

/// Trim and strip angle brackets so stored text can't carry markup.
pub fn sanitize_text(text: &str) -> String {
    text.trim().chars().filter(|c| !matches!(c, '<' | '>')).collect()
}

pub fn validate_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Whitespace inside the number is ignored.
pub fn validate_phone(phone: &str) -> bool {
    PHONE.is_match(&strip_whitespace(phone))
}

/// A contact is either an email address or a mobile number.
pub fn validate_contact(contact: &str) -> bool {
    let clean = strip_whitespace(contact);
    validate_email(&clean) || validate_phone(&clean)
}

/// Group a ten-digit number as `0555 12 34 56`. Anything else is returned
/// unchanged.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 10 {
        return phone.to_string();
    }
    format!("{} {} {} {}", &digits[0..4], &digits[4..6], &digits[6..8], &digits[8..10])
}

/// Keep the first `visible_chars` characters and star out the rest.
pub fn mask_sensitive_data(text: &str, visible_chars: usize) -> String {
    let total = text.chars().count();
    if total <= visible_chars {
        return text.to_string();
    }
    let visible: String = text.chars().take(visible_chars).collect();
    format!("{visible}{}", "*".repeat(total - visible_chars))
}

/// Document numbers are 3 to 20 characters once trimmed.
pub fn validate_document_number(number: &str) -> bool {
    let len = number.trim().chars().count();
    (3..=20).contains(&len)
}

pub fn is_valid_wilaya_id(id: u32) -> bool {
    (1..=MAX_WILAYA_ID).contains(&id)
}

pub fn validate_initials(initials: &str) -> bool {
    INITIALS.is_match(initials.trim())
}

/// Reduce a full name to initials: first and last word, `"K. M."`.
/// A single word gives one initial; an empty name gives `"X."`.
pub fn format_initials(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let initial = |word: &str| {
        word.chars()
            .next()
            .map(|c| c.to_uppercase().collect::<String>())
            .unwrap_or_else(|| "X".to_string())
    };

    match parts.as_slice() {
        [] => "X.".to_string(),
        [only] => format!("{}.", initial(only)),
        [first, .., last] => format!("{}. {}.", initial(first), initial(last)),
    }
}

/// Initials check with the message to show next to the field.
pub fn check_initials_format(text: &str) -> Result<(), FieldError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FieldError::InitialsMissing);
    }
    if trimmed.chars().count() > MAX_INITIALS_LEN {
        return Err(FieldError::InitialsTooLong);
    }
    if !INITIALS.is_match(trimmed) {
        return Err(FieldError::InitialsMalformed);
    }
    Ok(())
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
