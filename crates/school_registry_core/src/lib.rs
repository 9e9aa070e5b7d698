//! Core registry logic for schools, departments and students.
//! This crate is the single source of truth for registry invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::RegistryConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::department::Department;
pub use model::school::School;
pub use model::student::{Gender, Student};
pub use model::validation::ValidationError;
pub use model::EntityId;
pub use repo::department_repo::{DepartmentRepository, SqliteDepartmentRepository};
pub use repo::generic::{Cmp, Filter, RepoError, RepoResult, Repository, SqliteRepository, Table};
pub use repo::school_repo::{SchoolRepository, SchoolWithDepartments, SqliteSchoolRepository};
pub use repo::student_repo::{SqliteStudentRepository, StudentRepository};
pub use service::dto::{
    DepartmentDto, DepartmentStudentCountDto, PopularDepartmentDto, SchoolDepartmentsDto,
    SchoolDto, SchoolStudentCountDto, StudentDto,
};
pub use service::management_service::{
    NewStudent, SchoolManagementService, ServiceError, ServiceResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
