//! Student repository: table mapping and student lookups.
//!
//! # Responsibility
//! - Map student rows, including date and gender text columns.
//! - Provide gender, email and age-range queries.
//!
//! # Invariants
//! - Age is derived at query time; a student of age `a` on `today` is born
//!   in `(today - (a + 1) years, today - a years]`.
//! - Age ranges are validated before any SQL is issued.

use super::generic::{Filter, RepoError, RepoResult, Repository, SqliteRepository, Table};
use crate::model::student::{Gender, Student};
use crate::model::validation::{check_age_range, ValidationError};
use crate::model::EntityId;
use chrono::{Months, NaiveDate};
use rusqlite::types::Value;
use rusqlite::Row;

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Table for Student {
    const TABLE: &'static str = "students";
    const ENTITY: &'static str = "student";
    const COLUMNS: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "email",
        "date_of_birth",
        "gender",
        "department_id",
    ];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        self.validate_on(today)
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.first_name.clone()),
            Value::Text(self.last_name.clone()),
            Value::Text(self.email.clone()),
            date_to_db(self.date_of_birth),
            gender_to_db(self.gender),
            Value::Integer(self.department_id),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let dob_text: String = row.get("date_of_birth")?;
        let date_of_birth = NaiveDate::parse_from_str(&dob_text, DATE_FORMAT).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid date `{dob_text}` in students.date_of_birth"
            ))
        })?;

        let gender_text: String = row.get("gender")?;
        let gender = parse_gender(&gender_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid gender `{gender_text}` in students.gender"))
        })?;

        Ok(Self {
            id: Some(row.get("id")?),
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            email: row.get("email")?,
            date_of_birth,
            gender,
            department_id: row.get("department_id")?,
        })
    }
}

/// Student-specific queries on top of generic CRUD.
pub trait StudentRepository: Repository<Student> {
    fn filter_by_gender(&self, gender: Gender) -> RepoResult<Vec<Student>>;
    /// At most one student, since emails are unique.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<Student>>;
    /// Students aged within `[min_age, max_age]` as of the repository clock.
    fn find_by_age_range(&self, min_age: u32, max_age: u32) -> RepoResult<Vec<Student>>;
    /// Students aged within `[min_age, max_age]` as of `today`.
    fn find_by_age_range_on(
        &self,
        min_age: u32,
        max_age: u32,
        today: NaiveDate,
    ) -> RepoResult<Vec<Student>>;
    fn list_by_department(&self, department_id: EntityId) -> RepoResult<Vec<Student>>;
}

pub type SqliteStudentRepository<'conn> = SqliteRepository<'conn, Student>;

impl StudentRepository for SqliteRepository<'_, Student> {
    fn filter_by_gender(&self, gender: Gender) -> RepoResult<Vec<Student>> {
        self.find(&Filter::new().eq("gender", gender_to_db(gender)))
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<Student>> {
        let filter = Filter::new().eq("email", email.to_string());
        Ok(self.find(&filter)?.into_iter().next())
    }

    fn find_by_age_range(&self, min_age: u32, max_age: u32) -> RepoResult<Vec<Student>> {
        self.find_by_age_range_on(min_age, max_age, self.today())
    }

    fn find_by_age_range_on(
        &self,
        min_age: u32,
        max_age: u32,
        today: NaiveDate,
    ) -> RepoResult<Vec<Student>> {
        check_age_range(min_age, max_age)?;
        let invalid_range = || ValidationError::InvalidAgeRange { min_age, max_age };

        let born_after = years_before(today, max_age + 1).ok_or_else(invalid_range)?;
        let born_on_or_before = years_before(today, min_age).ok_or_else(invalid_range)?;

        let filter = Filter::new()
            .gt("date_of_birth", date_to_db(born_after))
            .le("date_of_birth", date_to_db(born_on_or_before));
        self.find(&filter)
    }

    fn list_by_department(&self, department_id: EntityId) -> RepoResult<Vec<Student>> {
        self.find(&Filter::new().eq("department_id", department_id))
    }
}

/// Same calendar day `years` earlier; Feb 29 clamps to Feb 28.
fn years_before(today: NaiveDate, years: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(years.checked_mul(12)?))
}

fn date_to_db(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

fn gender_to_db(gender: Gender) -> Value {
    Value::Text(gender.as_str().to_string())
}

fn parse_gender(value: &str) -> Option<Gender> {
    match value {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        "other" => Some(Gender::Other),
        _ => None,
    }
}
