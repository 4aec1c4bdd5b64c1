//! Input checks applied before anything is sent to the wallet API.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

// Bangladeshi mobile numbers, optionally prefixed with the 88 country code.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+?88)?01[3-9]\d{8}$").expect("phone pattern is valid"));

const MIN_PASSWORD_LEN: usize = 6;
const STRONG_PASSWORD_LEN: usize = 10;
const MIN_NAME_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("'{0}' is not a valid phone number")]
    InvalidPhone(String),

    #[error("Name must be at least 3 characters")]
    NameTooShort,

    #[error("Amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("A receiver email or phone number is required")]
    MissingReceiver,

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ValidationError::PasswordTooShort)
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone(phone.to_string()))
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() >= MIN_NAME_LEN {
        Ok(())
    } else {
        Err(ValidationError::NameTooShort)
    }
}

pub fn validate_amount(amount: f64) -> Result<(), ValidationError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidAmount(amount))
    }
}

/// Identifiers end up as a path segment, so they may not carry URL syntax.
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if !id.is_empty() && !id.contains(['/', '?', '#']) && !id.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(id.to_string()))
    }
}

pub fn password_strength(password: &str) -> PasswordStrength {
    match password.chars().count() {
        n if n < MIN_PASSWORD_LEN => PasswordStrength::Weak,
        n if n < STRONG_PASSWORD_LEN => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    }
}
