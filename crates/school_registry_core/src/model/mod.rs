//! Registry domain model for schools, departments and students.
//!
//! # Responsibility
//! - Define plain data records used by repositories and services.
//! - Own field-level validation rules shared by every write path.
//!
//! # Invariants
//! - Model types carry no persistence handles; relationships are plain ids.
//! - `id` is `None` until storage assigns one.
//! - Student age is derived from `date_of_birth`, never stored.

pub mod department;
pub mod school;
pub mod student;
pub mod validation;

use chrono::{Local, NaiveDate};

/// Storage-assigned row identifier shared by all registry entities.
pub type EntityId = i64;

/// Source of the reference date for age derivation and birth-date checks.
pub type Clock = fn() -> NaiveDate;

/// Default `Clock`: the local calendar date.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}
