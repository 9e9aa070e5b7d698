//! School management use-case service.
//!
//! # Responsibility
//! - Orchestrate school, department and student repositories per use case.
//! - Apply registry business rules (duplicate checks, most popular department).
//! - Return DTOs only; entities never leave this module.
//!
//! # Invariants
//! - Every operation issuing more than one statement runs inside one
//!   repository transaction, reads included.
//! - The service clock is shared with its repositories, so birth-date checks
//!   and age derivation use one reference date.
//! - Repository not-found results become `ServiceError::NotFound`.
//! - Constraint violations are passed through in `ServiceError::Repo`.
//! - "Most popular department" returns every department tied at the maximum
//!   student count, ordered by department id.

use crate::model::department::Department;
use crate::model::school::School;
use crate::model::student::{Gender, Student};
use crate::model::validation::{check_age_range, ValidationError};
use crate::model::{local_today, Clock, EntityId};
use crate::repo::department_repo::{DepartmentRepository, SqliteDepartmentRepository};
use crate::repo::generic::{Filter, RepoError, RepoResult, Repository, SqliteRepository};
use crate::repo::school_repo::{SchoolRepository, SqliteSchoolRepository};
use crate::repo::student_repo::{SqliteStudentRepository, StudentRepository};
use crate::service::dto::{
    DepartmentDto, DepartmentStudentCountDto, PopularDepartmentDto, SchoolDepartmentsDto,
    SchoolDto, SchoolStudentCountDto, StudentDto,
};
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from school management use cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before any persistence call.
    Validation(ValidationError),
    /// Referenced entity does not exist.
    NotFound { entity: &'static str, key: String },
    /// Entity with the same natural key already exists.
    AlreadyExists { entity: &'static str, key: String },
    /// Repository-level failure, including constraint violations.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} does not exist: {key}"),
            Self::AlreadyExists { entity, key } => write!(f, "{entity} already exists: {key}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } | Self::AlreadyExists { .. } => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound {
                entity,
                key: id.to_string(),
            },
            other => Self::Repo(other),
        }
    }
}

/// Request model for enrolling a student by school and department name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub school_name: String,
    pub department_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
}

/// Umbrella service over the three registry repositories.
pub struct SchoolManagementService<S, D, T> {
    schools: S,
    departments: D,
    students: T,
    clock: Clock,
}

impl<'conn>
    SchoolManagementService<
        SqliteSchoolRepository<'conn>,
        SqliteDepartmentRepository<'conn>,
        SqliteStudentRepository<'conn>,
    >
{
    /// Builds the service with SQLite repositories sharing `conn`.
    pub fn sqlite(conn: &'conn Connection) -> Self {
        Self::new(
            SqliteRepository::new(conn),
            SqliteRepository::new(conn),
            SqliteRepository::new(conn),
        )
    }
}

impl<S, D, T> SchoolManagementService<S, D, T>
where
    S: SchoolRepository,
    D: DepartmentRepository,
    T: StudentRepository,
{
    /// Creates a service from repository implementations.
    ///
    /// The repositories must share one session so transactions span them.
    pub fn new(schools: S, departments: D, students: T) -> Self {
        Self {
            schools,
            departments,
            students,
            clock: local_today,
        }
    }

    /// Replaces the date source used for age derivation and validation,
    /// in the service and in every repository it holds.
    pub fn with_clock(self, clock: Clock) -> Self {
        Self {
            schools: self.schools.with_clock(clock),
            departments: self.departments.with_clock(clock),
            students: self.students.with_clock(clock),
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Registers a new school.
    ///
    /// # Errors
    /// - `Validation` for a blank or oversized name/address.
    /// - `AlreadyExists` when a school with the same name exists.
    pub fn add_school(&self, name: &str, address: Option<&str>) -> ServiceResult<SchoolDto> {
        let school = School::new(name.trim(), address.map(str::to_string));
        school.validate()?;

        self.schools.with_transaction(|| -> ServiceResult<SchoolDto> {
            if self.schools.find_by_name(&school.name)?.is_some() {
                return Err(ServiceError::AlreadyExists {
                    entity: "school",
                    key: school.name.clone(),
                });
            }
            let stored = self.schools.add(&school)?;
            info!(
                "event=school_add module=service status=ok school_id={}",
                stored.id.unwrap_or_default()
            );
            Ok(SchoolDto::from_entity(&stored)?)
        })
    }

    /// Adds a department to an existing school.
    ///
    /// # Errors
    /// - `NotFound` when the school does not exist.
    /// - `AlreadyExists` when the school already has that department name.
    pub fn add_department_to_school(
        &self,
        school_name: &str,
        department_name: &str,
    ) -> ServiceResult<DepartmentDto> {
        let department_name = department_name.trim();
        Department::new(department_name, 0).validate()?;

        self.schools.with_transaction(|| -> ServiceResult<DepartmentDto> {
            let school = self.require_school_by_name(school_name)?;
            let school_id = school.id.ok_or(RepoError::MissingId("school"))?;
            let department = Department::new(department_name, school_id);
            if self
                .departments
                .find_by_name_in_school(school_id, department_name)?
                .is_some()
            {
                return Err(ServiceError::AlreadyExists {
                    entity: "department",
                    key: format!("{school_name}/{department_name}"),
                });
            }

            let stored = self.departments.add(&department)?;
            info!(
                "event=department_add module=service status=ok school_id={school_id} department_id={}",
                stored.id.unwrap_or_default()
            );
            Ok(DepartmentDto::from_entity(&stored)?)
        })
    }

    /// Enrolls a student into a department of a school, both by name.
    ///
    /// # Errors
    /// - `Validation` for malformed names, email or a future birth date.
    /// - `NotFound` when the school or department does not exist.
    /// - `AlreadyExists` when the email is already registered.
    pub fn add_student_to_school(&self, request: &NewStudent) -> ServiceResult<StudentDto> {
        let today = self.today();
        let mut student = Student::new(
            request.first_name.trim(),
            request.last_name.trim(),
            request.email.trim(),
            request.date_of_birth,
            request.gender,
            0,
        );
        student.validate_on(today)?;

        self.schools.with_transaction(|| -> ServiceResult<StudentDto> {
            let school = self.require_school_by_name(&request.school_name)?;
            let school_id = school.id.ok_or(RepoError::MissingId("school"))?;
            let department = self
                .departments
                .find_by_name_in_school(school_id, request.department_name.trim())?
                .ok_or_else(|| ServiceError::NotFound {
                    entity: "department",
                    key: format!("{}/{}", request.school_name, request.department_name),
                })?;

            if self.students.find_by_email(&student.email)?.is_some() {
                return Err(ServiceError::AlreadyExists {
                    entity: "student",
                    key: student.email.clone(),
                });
            }

            student.department_id = department.id.ok_or(RepoError::MissingId("department"))?;
            let stored = self.students.add(&student)?;
            info!(
                "event=student_add module=service status=ok department_id={} student_id={}",
                student.department_id,
                stored.id.unwrap_or_default()
            );
            Ok(StudentDto::from_entity(&stored, &department.name, today)?)
        })
    }

    /// Loads one student by id.
    pub fn get_student(&self, student_id: EntityId) -> ServiceResult<StudentDto> {
        self.students.with_transaction(|| -> ServiceResult<StudentDto> {
            let student = self
                .students
                .get_by_id(student_id)?
                .ok_or_else(|| ServiceError::NotFound {
                    entity: "student",
                    key: student_id.to_string(),
                })?;
            let mut dtos = self.to_student_dtos(vec![student])?;
            dtos.pop().ok_or(ServiceError::NotFound {
                entity: "student",
                key: student_id.to_string(),
            })
        })
    }

    /// Moves a student to another department.
    pub fn transfer_student(
        &self,
        student_id: EntityId,
        department_id: EntityId,
    ) -> ServiceResult<StudentDto> {
        self.students.with_transaction(|| -> ServiceResult<StudentDto> {
            let mut student =
                self.students
                    .get_by_id(student_id)?
                    .ok_or_else(|| ServiceError::NotFound {
                        entity: "student",
                        key: student_id.to_string(),
                    })?;
            let department = self.departments.get_by_id(department_id)?.ok_or_else(|| {
                ServiceError::NotFound {
                    entity: "department",
                    key: department_id.to_string(),
                }
            })?;

            student.department_id = department_id;
            self.students.update(&student)?;
            info!(
                "event=student_transfer module=service status=ok student_id={student_id} department_id={department_id}"
            );
            Ok(StudentDto::from_entity(
                &student,
                &department.name,
                self.today(),
            )?)
        })
    }

    /// Deletes a school together with its departments and their students.
    pub fn remove_school(&self, school_id: EntityId) -> ServiceResult<()> {
        if !self.schools.delete(school_id)? {
            return Err(ServiceError::NotFound {
                entity: "school",
                key: school_id.to_string(),
            });
        }
        info!("event=school_remove module=service status=ok school_id={school_id}");
        Ok(())
    }

    /// Deletes one student.
    pub fn remove_student(&self, student_id: EntityId) -> ServiceResult<()> {
        if !self.students.delete(student_id)? {
            return Err(ServiceError::NotFound {
                entity: "student",
                key: student_id.to_string(),
            });
        }
        info!("event=student_remove module=service status=ok student_id={student_id}");
        Ok(())
    }

    /// Returns the department(s) with the highest student count.
    ///
    /// Ties are all returned, ordered by department id. An empty registry
    /// yields an empty list.
    pub fn most_popular_department(&self) -> ServiceResult<Vec<PopularDepartmentDto>> {
        let counts = self.departments.get_with_student_counts()?;
        let Some(max_count) = counts.iter().map(|(_, count)| *count).max() else {
            info!("event=most_popular_department module=service status=empty reason=no_departments");
            return Ok(Vec::new());
        };

        let mut leaders: Vec<&(Department, u64)> = counts
            .iter()
            .filter(|(_, count)| *count == max_count)
            .collect();
        leaders.sort_by_key(|(department, _)| department.id);

        leaders
            .into_iter()
            .map(|(department, count)| PopularDepartmentDto::from_entity(department, *count))
            .collect::<RepoResult<Vec<_>>>()
            .map_err(ServiceError::from)
    }

    /// Student count for every department, busiest first.
    pub fn department_student_counts(&self) -> ServiceResult<Vec<DepartmentStudentCountDto>> {
        let counts = self.departments.get_with_student_counts()?;
        if counts.is_empty() {
            info!("event=department_student_counts module=service status=empty");
        }
        counts
            .iter()
            .map(|(department, count)| DepartmentStudentCountDto::from_entity(department, *count))
            .collect::<RepoResult<Vec<_>>>()
            .map_err(ServiceError::from)
    }

    /// Student count for every school, busiest first.
    pub fn schools_by_student_count(&self) -> ServiceResult<Vec<SchoolStudentCountDto>> {
        let counts = self.schools.get_with_student_counts()?;
        if counts.is_empty() {
            info!("event=schools_by_student_count module=service status=empty");
        }
        counts
            .iter()
            .map(|(school, count)| SchoolStudentCountDto::from_entity(school, *count))
            .collect::<RepoResult<Vec<_>>>()
            .map_err(ServiceError::from)
    }

    /// Every school with its departments.
    pub fn schools_with_all_departments(&self) -> ServiceResult<Vec<SchoolDepartmentsDto>> {
        let schools = self.schools.get_all_with_departments()?;
        if schools.is_empty() {
            info!("event=schools_with_all_departments module=service status=empty");
        }
        schools
            .iter()
            .map(|entry| SchoolDepartmentsDto::from_entity(&entry.school, &entry.departments))
            .collect::<RepoResult<Vec<_>>>()
            .map_err(ServiceError::from)
    }

    pub fn find_students_by_gender(&self, gender: Gender) -> ServiceResult<Vec<StudentDto>> {
        self.students.with_transaction(|| -> ServiceResult<Vec<StudentDto>> {
            let students = self.students.filter_by_gender(gender)?;
            if students.is_empty() {
                info!("event=find_students_by_gender module=service status=empty gender={gender}");
            }
            self.to_student_dtos(students)
        })
    }

    /// Students whose age lies within `[min_age, max_age]` today.
    pub fn find_students_between_age_range(
        &self,
        min_age: u32,
        max_age: u32,
    ) -> ServiceResult<Vec<StudentDto>> {
        check_age_range(min_age, max_age)?;
        self.students.with_transaction(|| -> ServiceResult<Vec<StudentDto>> {
            let students = self
                .students
                .find_by_age_range_on(min_age, max_age, self.today())?;
            if students.is_empty() {
                info!(
                    "event=find_students_between_age_range module=service status=empty min_age={min_age} max_age={max_age}"
                );
            }
            self.to_student_dtos(students)
        })
    }

    /// Looks up a student by exact email; `None` when absent.
    pub fn find_student_by_email(&self, email: &str) -> ServiceResult<Option<StudentDto>> {
        self.students.with_transaction(|| -> ServiceResult<Option<StudentDto>> {
            let Some(student) = self.students.find_by_email(email.trim())? else {
                info!("event=find_student_by_email module=service status=empty");
                return Ok(None);
            };
            Ok(self.to_student_dtos(vec![student])?.pop())
        })
    }

    fn require_school_by_name(&self, name: &str) -> ServiceResult<School> {
        self.schools
            .find_by_name(name.trim())?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "school",
                key: name.to_string(),
            })
    }

    /// Maps students to DTOs, resolving department names in one query.
    ///
    /// Callers run this inside the transaction that loaded `students`.
    fn to_student_dtos(&self, students: Vec<Student>) -> ServiceResult<Vec<StudentDto>> {
        let department_ids: BTreeSet<EntityId> =
            students.iter().map(|student| student.department_id).collect();
        let department_names: HashMap<EntityId, String> = self
            .departments
            .find(&Filter::new().any_of("id", department_ids))?
            .into_iter()
            .filter_map(|department| department.id.map(|id| (id, department.name)))
            .collect();

        let today = self.today();
        students
            .iter()
            .map(|student| {
                let name = department_names.get(&student.department_id).ok_or(
                    RepoError::NotFound {
                        entity: "department",
                        id: student.department_id,
                    },
                )?;
                StudentDto::from_entity(student, name, today)
            })
            .collect::<RepoResult<Vec<_>>>()
            .map_err(ServiceError::from)
    }
}
