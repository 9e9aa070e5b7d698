//! Flat read models returned by the service layer.
//!
//! DTOs carry no behavior beyond data holding and equality; mapping from
//! entities happens here so persistence shape never leaks to callers.

use crate::model::department::Department;
use crate::model::school::School;
use crate::model::student::{Gender, Student};
use crate::model::EntityId;
use crate::repo::generic::{RepoError, RepoResult};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolDto {
    pub id: EntityId,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentDto {
    pub id: EntityId,
    pub name: String,
    pub school_id: EntityId,
}

/// School with every department it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolDepartmentsDto {
    pub id: EntityId,
    pub name: String,
    pub address: Option<String>,
    pub departments: Vec<DepartmentDto>,
}

/// Student projection with derived age and resolved department name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDto {
    pub id: EntityId,
    pub full_name: String,
    pub email: String,
    pub age: u32,
    pub gender: Gender,
    pub department_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularDepartmentDto {
    pub department_id: EntityId,
    pub name: String,
    pub student_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentStudentCountDto {
    pub department_id: EntityId,
    pub name: String,
    pub school_id: EntityId,
    pub student_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolStudentCountDto {
    pub school_id: EntityId,
    pub name: String,
    pub student_count: u64,
}

impl SchoolDto {
    pub(crate) fn from_entity(school: &School) -> RepoResult<Self> {
        Ok(Self {
            id: persisted_id(school.id, "school")?,
            name: school.name.clone(),
            address: school.address.clone(),
        })
    }
}

impl DepartmentDto {
    pub(crate) fn from_entity(department: &Department) -> RepoResult<Self> {
        Ok(Self {
            id: persisted_id(department.id, "department")?,
            name: department.name.clone(),
            school_id: department.school_id,
        })
    }
}

impl SchoolDepartmentsDto {
    pub(crate) fn from_entity(school: &School, departments: &[Department]) -> RepoResult<Self> {
        Ok(Self {
            id: persisted_id(school.id, "school")?,
            name: school.name.clone(),
            address: school.address.clone(),
            departments: departments
                .iter()
                .map(DepartmentDto::from_entity)
                .collect::<RepoResult<Vec<_>>>()?,
        })
    }
}

impl StudentDto {
    pub(crate) fn from_entity(
        student: &Student,
        department_name: &str,
        today: NaiveDate,
    ) -> RepoResult<Self> {
        Ok(Self {
            id: persisted_id(student.id, "student")?,
            full_name: student.full_name(),
            email: student.email.clone(),
            age: student.age_on(today),
            gender: student.gender,
            department_name: department_name.to_string(),
        })
    }
}

impl PopularDepartmentDto {
    pub(crate) fn from_entity(department: &Department, student_count: u64) -> RepoResult<Self> {
        Ok(Self {
            department_id: persisted_id(department.id, "department")?,
            name: department.name.clone(),
            student_count,
        })
    }
}

impl DepartmentStudentCountDto {
    pub(crate) fn from_entity(department: &Department, student_count: u64) -> RepoResult<Self> {
        Ok(Self {
            department_id: persisted_id(department.id, "department")?,
            name: department.name.clone(),
            school_id: department.school_id,
            student_count,
        })
    }
}

impl SchoolStudentCountDto {
    pub(crate) fn from_entity(school: &School, student_count: u64) -> RepoResult<Self> {
        Ok(Self {
            school_id: persisted_id(school.id, "school")?,
            name: school.name.clone(),
            student_count,
        })
    }
}

fn persisted_id(id: Option<EntityId>, entity: &'static str) -> RepoResult<EntityId> {
    id.ok_or(RepoError::MissingId(entity))
}
