use serde::Deserialize;
use sqlx::types::BigDecimal;
use std::fmt;

use crate::phone;

pub const PHONE_INPUT_MAX_LEN: usize = 20;
pub const REFERENCE_CODE_LEN: usize = 8;
pub const NOTES_MAX_LEN: usize = 100;
pub const ALLOWED_PROVIDERS: &[&str] = &["airtel", "zamtel", "mtn"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrictPayload<T> {
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

pub fn validate_provider_name(provider: &str) -> ValidationResult {
    let provider = sanitize_string(provider);
    validate_required("provider", &provider)?;
    validate_enum("provider", &provider, ALLOWED_PROVIDERS)?;

    Ok(())
}

pub fn validate_phone_number(raw: &str) -> ValidationResult {
    let raw = sanitize_string(raw);
    validate_required("phone_number", &raw)?;
    validate_max_len("phone_number", &raw, PHONE_INPUT_MAX_LEN)?;

    if !phone::is_valid(&raw) {
        return Err(ValidationError::new(
            "phone_number",
            "invalid Zambian phone number format",
        ));
    }

    Ok(())
}

pub fn validate_reference_code(code: &str) -> ValidationResult {
    if code.len() != REFERENCE_CODE_LEN || !code.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            "reference_code",
            format!("must be exactly {} digits", REFERENCE_CODE_LEN),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}
