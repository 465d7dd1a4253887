use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref UPPER_RE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref LOWER_RE: Regex = Regex::new(r"[a-z]").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
    static ref SPECIAL_RE: Regex = Regex::new(r"[^0-9A-Za-z_]").unwrap();
    static ref SPACE_RE: Regex = Regex::new(r"\s").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Password acceptance rules, checked in order; the first broken rule is reported.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    let rules: [(bool, &str); 6] = [
        (
            password.chars().count() >= MIN_PASSWORD_LEN,
            "Password must be at least 8 characters",
        ),
        (
            UPPER_RE.is_match(password),
            "Password must contain at least one uppercase letter",
        ),
        (
            LOWER_RE.is_match(password),
            "Password must contain at least one lowercase letter",
        ),
        (
            DIGIT_RE.is_match(password),
            "Password must contain at least one number",
        ),
        (
            SPECIAL_RE.is_match(password),
            "Password must contain at least one special character",
        ),
        (
            !SPACE_RE.is_match(password),
            "Password must not contain spaces",
        ),
    ];

    match rules.iter().find(|(ok, _)| !ok) {
        Some((_, message)) => Err(AppError::WeakCredential((*message).to_string())),
        None => Ok(()),
    }
}
