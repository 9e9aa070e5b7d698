use chrono::NaiveDate;
use rusqlite::Connection;
use school_registry_core::db::open_db_in_memory;
use school_registry_core::{
    Gender, NewStudent, PopularDepartmentDto, RepoError, Repository, SchoolManagementService,
    ServiceError, SqliteDepartmentRepository, SqliteSchoolRepository, SqliteStudentRepository,
    Student, StudentDto, ValidationError,
};

type SqliteService<'conn> = SchoolManagementService<
    SqliteSchoolRepository<'conn>,
    SqliteDepartmentRepository<'conn>,
    SqliteStudentRepository<'conn>,
>;

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

fn service(conn: &Connection) -> SqliteService<'_> {
    SchoolManagementService::sqlite(conn).with_clock(fixed_today)
}

fn new_student(school: &str, department: &str, email: &str, born: NaiveDate) -> NewStudent {
    NewStudent {
        school_name: school.to_string(),
        department_name: department.to_string(),
        first_name: "John".to_string(),
        last_name: "Smith".to_string(),
        email: email.to_string(),
        date_of_birth: born,
        gender: Gender::Male,
    }
}

fn born(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn enroll(service: &SqliteService<'_>, school: &str, department: &str, prefix: &str, count: usize) {
    for index in 0..count {
        service
            .add_student_to_school(&new_student(
                school,
                department,
                &format!("{prefix}{index}@example.com"),
                born(2005, 1, 1),
            ))
            .unwrap();
    }
}

#[test]
fn most_popular_department_picks_the_largest() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    let art = service.add_department_to_school("Lincoln High", "Art").unwrap();
    enroll(&service, "Lincoln High", "Math", "math", 3);
    enroll(&service, "Lincoln High", "Art", "art", 5);

    let popular = service.most_popular_department().unwrap();
    assert_eq!(
        popular,
        vec![PopularDepartmentDto {
            department_id: art.id,
            name: "Art".to_string(),
            student_count: 5,
        }]
    );
}

#[test]
fn most_popular_department_returns_every_tie() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    for name in ["Math", "Art", "Drama"] {
        service.add_department_to_school("Lincoln High", name).unwrap();
    }
    enroll(&service, "Lincoln High", "Art", "art", 2);
    enroll(&service, "Lincoln High", "Math", "math", 2);
    enroll(&service, "Lincoln High", "Drama", "drama", 1);

    let names: Vec<String> = service
        .most_popular_department()
        .unwrap()
        .into_iter()
        .map(|dto| dto.name)
        .collect();
    assert_eq!(names, vec!["Math", "Art"]);
}

#[test]
fn most_popular_department_is_empty_without_departments() {
    let conn = open_db_in_memory().unwrap();
    assert!(service(&conn).most_popular_department().unwrap().is_empty());
}

#[test]
fn department_and_school_counts_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_school("Quiet Academy", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    service.add_department_to_school("Quiet Academy", "Library").unwrap();
    enroll(&service, "Lincoln High", "Math", "math", 2);

    let departments = service.department_student_counts().unwrap();
    assert_eq!(departments.len(), 2);
    assert_eq!((departments[0].name.as_str(), departments[0].student_count), ("Math", 2));
    assert_eq!((departments[1].name.as_str(), departments[1].student_count), ("Library", 0));

    let schools = service.schools_by_student_count().unwrap();
    assert_eq!(schools[0].name, "Lincoln High");
    assert_eq!(schools[0].student_count, 2);
    assert_eq!(schools[1].student_count, 0);
}

#[test]
fn schools_with_all_departments_maps_each_school() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let harvard = service
        .add_school("Harvard University", Some("Cambridge, MA"))
        .unwrap();
    service.add_school("Cambridge University", None).unwrap();
    service.add_department_to_school("Harvard University", "Mathematics").unwrap();
    service.add_department_to_school("Harvard University", "Biology").unwrap();

    let schools = service.schools_with_all_departments().unwrap();
    assert_eq!(schools.len(), 2);
    assert_eq!(schools[0].id, harvard.id);
    assert_eq!(schools[0].address.as_deref(), Some("Cambridge, MA"));
    assert_eq!(schools[0].departments.len(), 2);
    assert!(schools[0]
        .departments
        .iter()
        .all(|department| department.school_id == harvard.id));
    assert!(schools[1].departments.is_empty());
}

#[test]
fn add_school_rejects_duplicates_and_blank_names() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Test School", None).unwrap();

    let err = service.add_school("Test School", None).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AlreadyExists { entity: "school", .. }
    ));
    let err = service.add_school("  ", None).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::BlankField(_))
    ));
}

#[test]
fn add_department_requires_school_and_unique_name() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .add_department_to_school("Test School", "Test Department")
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "school", .. }));

    service.add_school("Test School", None).unwrap();
    service
        .add_department_to_school("Test School", "Test Department")
        .unwrap();
    let err = service
        .add_department_to_school("Test School", "Test Department")
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AlreadyExists { entity: "department", .. }
    ));
}

#[test]
fn add_student_maps_to_dto_with_derived_age() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Harvard University", None).unwrap();
    service
        .add_department_to_school("Harvard University", "Mathematics")
        .unwrap();

    let dto = service
        .add_student_to_school(&new_student(
            "Harvard University",
            "Mathematics",
            "JS@example.com",
            born(1995, 6, 16),
        ))
        .unwrap();
    assert_eq!(
        dto,
        StudentDto {
            id: dto.id,
            full_name: "John Smith".to_string(),
            email: "JS@example.com".to_string(),
            age: 29,
            gender: Gender::Male,
            department_name: "Mathematics".to_string(),
        }
    );
    assert_eq!(service.get_student(dto.id).unwrap(), dto);
}

#[test]
fn add_student_reports_missing_school_department_and_duplicate_email() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let request = new_student("Test School", "Test Department", "test@test.com", born(2005, 1, 1));

    let err = service.add_student_to_school(&request).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "school", .. }));

    service.add_school("Test School", None).unwrap();
    let err = service.add_student_to_school(&request).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound { entity: "department", .. }
    ));

    service
        .add_department_to_school("Test School", "Test Department")
        .unwrap();
    service.add_student_to_school(&request).unwrap();
    let err = service.add_student_to_school(&request).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::AlreadyExists { entity: "student", .. }
    ));
}

#[test]
fn add_student_validates_before_touching_storage() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .add_student_to_school(&new_student("Nowhere", "Nothing", "test@.test.com", born(2005, 1, 1)))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::InvalidEmail(_))
    ));

    let err = service
        .add_student_to_school(&new_student("Nowhere", "Nothing", "ok@test.com", born(2030, 1, 1)))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::DateOfBirthInFuture(_))
    ));
}

#[test]
fn student_queries_return_dtos() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    service
        .add_student_to_school(&new_student("Lincoln High", "Math", "young@example.com", born(2007, 6, 15)))
        .unwrap();
    let mut older = new_student("Lincoln High", "Math", "older@example.com", born(2000, 1, 1));
    older.gender = Gender::Female;
    service.add_student_to_school(&older).unwrap();

    let females = service.find_students_by_gender(Gender::Female).unwrap();
    assert_eq!(females.len(), 1);
    assert_eq!(females[0].email, "older@example.com");
    assert_eq!(females[0].department_name, "Math");
    assert!(service.find_students_by_gender(Gender::Other).unwrap().is_empty());

    let teens = service.find_students_between_age_range(18, 22).unwrap();
    assert_eq!(teens.len(), 1);
    assert_eq!(teens[0].age, 18);

    let found = service.find_student_by_email("older@example.com").unwrap().unwrap();
    assert_eq!(found.age, 25);
    assert!(service.find_student_by_email("nobody@example.com").unwrap().is_none());

    let err = service.find_students_between_age_range(22, 18).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::InvalidAgeRange { .. })
    ));
}

#[test]
fn transfer_student_moves_between_departments() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    let art = service.add_department_to_school("Lincoln High", "Art").unwrap();
    let student = service
        .add_student_to_school(&new_student("Lincoln High", "Math", "js@example.com", born(2005, 1, 1)))
        .unwrap();

    let moved = service.transfer_student(student.id, art.id).unwrap();
    assert_eq!(moved.department_name, "Art");
    assert_eq!(service.get_student(student.id).unwrap(), moved);

    let err = service.transfer_student(student.id, 999).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound { entity: "department", .. }
    ));
    let err = service.transfer_student(999, art.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "student", .. }));
}

#[test]
fn remove_school_cascades_and_reports_missing_ids() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let school = service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    let student = service
        .add_student_to_school(&new_student("Lincoln High", "Math", "js@example.com", born(2005, 1, 1)))
        .unwrap();

    service.remove_school(school.id).unwrap();

    assert!(service.schools_with_all_departments().unwrap().is_empty());
    assert!(service.department_student_counts().unwrap().is_empty());
    assert!(matches!(
        service.get_student(student.id).unwrap_err(),
        ServiceError::NotFound { entity: "student", .. }
    ));
    assert!(matches!(
        service.remove_school(school.id).unwrap_err(),
        ServiceError::NotFound { entity: "school", .. }
    ));
}

#[test]
fn remove_student_deletes_only_that_student() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    enroll(&service, "Lincoln High", "Math", "math", 2);
    let first = service.find_student_by_email("math0@example.com").unwrap().unwrap();

    service.remove_student(first.id).unwrap();

    assert!(service.find_student_by_email("math0@example.com").unwrap().is_none());
    assert!(service.find_student_by_email("math1@example.com").unwrap().is_some());
    assert!(matches!(
        service.remove_student(first.id).unwrap_err(),
        ServiceError::NotFound { .. }
    ));
}

#[test]
fn storage_constraint_violations_surface_as_repo_errors() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    let math = service.add_department_to_school("Lincoln High", "Math").unwrap();
    enroll(&service, "Lincoln High", "Math", "math", 1);

    let duplicate = Student::new(
        "Jane",
        "Doe",
        "math0@example.com",
        born(2004, 2, 2),
        Gender::Female,
        math.id,
    );
    let err = ServiceError::from(
        SqliteStudentRepository::new(&conn)
            .add(&duplicate)
            .unwrap_err(),
    );
    assert!(matches!(err, ServiceError::Repo(RepoError::Constraint(_))));
}

#[test]
fn dtos_serialize_with_flat_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    let dto = service
        .add_student_to_school(&new_student("Lincoln High", "Math", "js@example.com", born(2005, 1, 1)))
        .unwrap();

    let json = serde_json::to_value(&dto).unwrap();
    assert_eq!(json["full_name"], "John Smith");
    assert_eq!(json["gender"], "male");
    assert_eq!(json["department_name"], "Math");
    assert_eq!(json["age"], 20);
}

#[test]
fn clock_ahead_of_wall_time_accepts_births_before_it() {
    fn year_2099() -> NaiveDate {
        NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()
    }

    let conn = open_db_in_memory().unwrap();
    let service = SchoolManagementService::sqlite(&conn).with_clock(year_2099);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();
    let art = service.add_department_to_school("Lincoln High", "Art").unwrap();

    let dto = service
        .add_student_to_school(&new_student("Lincoln High", "Math", "js@example.com", born(2080, 1, 1)))
        .unwrap();
    assert_eq!(dto.age, 19);

    let moved = service.transfer_student(dto.id, art.id).unwrap();
    assert_eq!(moved.department_name, "Art");
    assert_eq!(service.find_students_between_age_range(19, 19).unwrap().len(), 1);
}

#[test]
fn student_reads_share_the_callers_unit_of_work() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.add_school("Lincoln High", None).unwrap();
    service.add_department_to_school("Lincoln High", "Math").unwrap();

    let outer = conn.unchecked_transaction().unwrap();
    let dto = service
        .add_student_to_school(&new_student("Lincoln High", "Math", "js@example.com", born(2005, 1, 1)))
        .unwrap();
    assert_eq!(service.get_student(dto.id).unwrap(), dto);
    assert_eq!(service.find_students_by_gender(Gender::Male).unwrap(), vec![dto.clone()]);
    assert!(!conn.is_autocommit());
    drop(outer);

    assert!(service.find_student_by_email("js@example.com").unwrap().is_none());
    assert!(service.find_students_between_age_range(0, 150).unwrap().is_empty());
    assert!(conn.is_autocommit());
}
