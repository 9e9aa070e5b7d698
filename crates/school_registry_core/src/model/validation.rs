//! Field validation rules for registry entities.
//!
//! # Responsibility
//! - Reject malformed input before any SQL is issued.
//! - Keep length limits in one place so schema and code agree.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum length of person and organisation names.
pub const MAX_NAME_CHARS: usize = 50;
/// Maximum length of a school address.
pub const MAX_ADDRESS_CHARS: usize = 200;
/// Maximum length of a student email.
pub const MAX_EMAIL_CHARS: usize = 100;
/// Upper bound accepted for age range queries.
pub const MAX_QUERY_AGE: u32 = 150;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("email pattern must compile")
});

/// Input validation failures raised before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Text field exceeds its character limit.
    FieldTooLong { field: &'static str, max_chars: usize },
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Gender text is outside the enumerated set.
    InvalidGender(String),
    /// Age range is inverted or exceeds `MAX_QUERY_AGE`.
    InvalidAgeRange { min_age: u32, max_age: u32 },
    /// Birth date lies after the reference date.
    DateOfBirthInFuture(chrono::NaiveDate),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::FieldTooLong { field, max_chars } => {
                write!(f, "{field} must be at most {max_chars} characters")
            }
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::InvalidGender(value) => {
                write!(f, "invalid gender `{value}`; expected male|female|other")
            }
            Self::InvalidAgeRange { min_age, max_age } => write!(
                f,
                "invalid age range [{min_age}, {max_age}]; expected min <= max <= {MAX_QUERY_AGE}"
            ),
            Self::DateOfBirthInFuture(date) => {
                write!(f, "date of birth {date} is in the future")
            }
        }
    }
}

impl Error for ValidationError {}

/// Checks a required, length-limited text field.
pub fn require_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    check_length(field, value, max_chars)
}

/// Checks only the length limit of a text field.
pub fn check_length(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max_chars {
        return Err(ValidationError::FieldTooLong { field, max_chars });
    }
    Ok(())
}

/// Checks email shape and length.
pub fn check_email(value: &str) -> Result<(), ValidationError> {
    check_length("email", value, MAX_EMAIL_CHARS)?;
    if !EMAIL_PATTERN.is_match(value) {
        return Err(ValidationError::InvalidEmail(value.to_string()));
    }
    Ok(())
}

/// Checks an inclusive age query range.
pub fn check_age_range(min_age: u32, max_age: u32) -> Result<(), ValidationError> {
    if min_age > max_age || max_age > MAX_QUERY_AGE {
        return Err(ValidationError::InvalidAgeRange { min_age, max_age });
    }
    Ok(())
}
