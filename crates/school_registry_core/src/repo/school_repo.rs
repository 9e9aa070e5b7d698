//! School repository: table mapping and school-specific queries.
//!
//! # Invariants
//! - `get_all_with_departments` loads schools and departments in one
//!   round trip; schools without departments keep an empty list.
//! - Aggregates are ordered by count descending, then id ascending.

use super::generic::{aliased_columns, Filter, RepoResult, Repository, SqliteRepository, Table};
use crate::model::department::Department;
use crate::model::school::School;
use crate::model::validation::ValidationError;
use crate::model::EntityId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;

impl Table for School {
    const TABLE: &'static str = "schools";
    const ENTITY: &'static str = "school";
    const COLUMNS: &'static [&'static str] = &["name", "address"];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        School::validate(self)
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone()), self.address.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            name: row.get("name")?,
            address: row.get("address")?,
        })
    }
}

/// School with its departments eagerly materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolWithDepartments {
    pub school: School,
    pub departments: Vec<Department>,
}

/// School-specific queries on top of generic CRUD.
pub trait SchoolRepository: Repository<School> {
    fn find_by_name(&self, name: &str) -> RepoResult<Option<School>>;
    /// Every school with its departments, ordered by school id then
    /// department id.
    fn get_all_with_departments(&self) -> RepoResult<Vec<SchoolWithDepartments>>;
    /// `(school, number of students across its departments)` pairs.
    fn get_with_student_counts(&self) -> RepoResult<Vec<(School, u64)>>;
}

pub type SqliteSchoolRepository<'conn> = SqliteRepository<'conn, School>;

impl SchoolRepository for SqliteRepository<'_, School> {
    fn find_by_name(&self, name: &str) -> RepoResult<Option<School>> {
        let filter = Filter::new().eq("name", name.to_string());
        Ok(self.find(&filter)?.into_iter().next())
    }

    fn get_all_with_departments(&self) -> RepoResult<Vec<SchoolWithDepartments>> {
        let mut stmt = self.connection().prepare(
            "SELECT
                sc.id AS school_id,
                sc.name AS school_name,
                sc.address AS school_address,
                d.id AS department_id,
                d.name AS department_name
             FROM schools sc
             LEFT JOIN departments d ON d.school_id = sc.id
             ORDER BY sc.id ASC, d.id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut schools: Vec<SchoolWithDepartments> = Vec::new();

        while let Some(row) = rows.next()? {
            let school_id: EntityId = row.get("school_id")?;
            let starts_new_school = schools
                .last()
                .map_or(true, |entry| entry.school.id != Some(school_id));
            if starts_new_school {
                schools.push(SchoolWithDepartments {
                    school: School {
                        id: Some(school_id),
                        name: row.get("school_name")?,
                        address: row.get("school_address")?,
                    },
                    departments: Vec::new(),
                });
            }

            if let Some(department_id) = row.get::<_, Option<EntityId>>("department_id")? {
                let department = Department {
                    id: Some(department_id),
                    name: row.get("department_name")?,
                    school_id,
                };
                if let Some(entry) = schools.last_mut() {
                    entry.departments.push(department);
                }
            }
        }

        Ok(schools)
    }

    fn get_with_student_counts(&self) -> RepoResult<Vec<(School, u64)>> {
        let sql = format!(
            "SELECT {}, COUNT(st.id) AS student_count
             FROM schools sc
             LEFT JOIN departments d ON d.school_id = sc.id
             LEFT JOIN students st ON st.department_id = d.id
             GROUP BY sc.id
             ORDER BY student_count DESC, sc.id ASC;",
            aliased_columns::<School>("sc")
        );
        self.query_entities_with_count(&sql, "student_count")
    }
}
