//! Department repository: table mapping and department aggregates.

use super::generic::{aliased_columns, Filter, RepoResult, Repository, SqliteRepository, Table};
use crate::model::department::Department;
use crate::model::validation::ValidationError;
use crate::model::EntityId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;

impl Table for Department {
    const TABLE: &'static str = "departments";
    const ENTITY: &'static str = "department";
    const COLUMNS: &'static [&'static str] = &["name", "school_id"];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn validate(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        Department::validate(self)
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone()), Value::Integer(self.school_id)]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            name: row.get("name")?,
            school_id: row.get("school_id")?,
        })
    }
}

/// Department-specific queries on top of generic CRUD.
pub trait DepartmentRepository: Repository<Department> {
    /// `(department, student count)` for every department, computed by a
    /// grouped aggregate. Departments without students report `0`.
    ///
    /// Ordered by count descending, then department id ascending.
    fn get_with_student_counts(&self) -> RepoResult<Vec<(Department, u64)>>;
    fn find_by_name_in_school(
        &self,
        school_id: EntityId,
        name: &str,
    ) -> RepoResult<Option<Department>>;
    fn list_by_school(&self, school_id: EntityId) -> RepoResult<Vec<Department>>;
}

pub type SqliteDepartmentRepository<'conn> = SqliteRepository<'conn, Department>;

impl DepartmentRepository for SqliteRepository<'_, Department> {
    fn get_with_student_counts(&self) -> RepoResult<Vec<(Department, u64)>> {
        let sql = format!(
            "SELECT {}, COUNT(st.id) AS student_count
             FROM departments d
             LEFT JOIN students st ON st.department_id = d.id
             GROUP BY d.id
             ORDER BY student_count DESC, d.id ASC;",
            aliased_columns::<Department>("d")
        );
        self.query_entities_with_count(&sql, "student_count")
    }

    fn find_by_name_in_school(
        &self,
        school_id: EntityId,
        name: &str,
    ) -> RepoResult<Option<Department>> {
        let filter = Filter::new()
            .eq("school_id", school_id)
            .eq("name", name.to_string());
        Ok(self.find(&filter)?.into_iter().next())
    }

    fn list_by_school(&self, school_id: EntityId) -> RepoResult<Vec<Department>> {
        self.find(&Filter::new().eq("school_id", school_id))
    }
}
