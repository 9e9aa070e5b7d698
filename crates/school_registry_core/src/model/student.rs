//! Student domain model.
//!
//! # Responsibility
//! - Define the student record and its gender enumeration.
//! - Derive age from date of birth against a caller-supplied reference date.
//!
//! # Invariants
//! - `email` is unique across students (enforced by storage).
//! - `date_of_birth` must not be later than the validation reference date.

use super::validation::{check_email, require_text, ValidationError, MAX_NAME_CHARS};
use super::EntityId;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Enumerated gender values accepted by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Stable lowercase text used for storage and display.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    /// Accepts full names case-insensitively, plus the `m`/`f`/`o` short forms.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "other" | "o" => Ok(Self::Other),
            _ => Err(ValidationError::InvalidGender(value.to_string())),
        }
    }
}

/// Student enrolled in exactly one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub department_id: EntityId,
}

impl Student {
    /// Creates an unsaved student.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        date_of_birth: NaiveDate,
        gender: Gender,
        department_id: EntityId,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            date_of_birth,
            gender,
            department_id,
        }
    }

    /// `first_name last_name`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Completed years between `date_of_birth` and `today`.
    ///
    /// Returns `0` when `today` is before the birth date.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_between(self.date_of_birth, today)
    }

    /// Validates field rules against an explicit reference date.
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), ValidationError> {
        require_text("first name", &self.first_name, MAX_NAME_CHARS)?;
        require_text("last name", &self.last_name, MAX_NAME_CHARS)?;
        check_email(&self.email)?;
        if self.date_of_birth > today {
            return Err(ValidationError::DateOfBirthInFuture(self.date_of_birth));
        }
        Ok(())
    }
}

/// Completed years from `born` to `today`; birthdays count on the day itself.
pub fn age_between(born: NaiveDate, today: NaiveDate) -> u32 {
    if today < born {
        return 0;
    }
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}
