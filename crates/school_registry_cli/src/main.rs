//! CLI smoke entry point.
//!
//! # Responsibility
//! - Seed the demo registry and print service reports.
//! - Exercise config, logging and service wiring end to end.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{info, warn};
use school_registry_core::{
    init_logging, Gender, NewStudent, RegistryConfig, SchoolManagementService, ServiceError,
    ServiceResult, SqliteDepartmentRepository, SqliteSchoolRepository, SqliteStudentRepository,
};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "school-registry")]
#[command(about = "Seed and inspect a school registry database")]
struct Args {
    /// SQLite file; overrides SCHOOL_REGISTRY_DB_PATH. In-memory when unset.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Rolling log directory; overrides SCHOOL_REGISTRY_LOG_DIR.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level; overrides SCHOOL_REGISTRY_LOG_LEVEL.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert the demo schools, departments and students.
    Seed,
    /// Print registry reports.
    Report,
    /// Seed then report in one session.
    Demo,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Values already set in the environment win over `.env`.
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("loaded environment from {}", path.display());
    }
    let args = Args::parse();

    let mut config = RegistryConfig::from_env();
    if args.db.is_some() {
        config.db_path = args.db;
    }
    if args.log_dir.is_some() {
        config.log_dir = args.log_dir;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = config.open_database()?;
    let service = SchoolManagementService::sqlite(&conn);

    match args.command {
        Command::Seed => seed(&service)?,
        Command::Report => report(&service)?,
        Command::Demo => {
            seed(&service)?;
            report(&service)?;
        }
    }
    Ok(())
}

type SqliteService<'conn> = SchoolManagementService<
    SqliteSchoolRepository<'conn>,
    SqliteDepartmentRepository<'conn>,
    SqliteStudentRepository<'conn>,
>;

const DEMO_SCHOOLS: [(&str, [&str; 2]); 2] = [
    ("Harvard University", ["Mathematics", "Biology"]),
    ("Cambridge University", ["Informatica", "Chemics"]),
];

/// (school, department, first name, last name, email, birth date)
const DEMO_STUDENTS: [(&str, &str, &str, &str, &str, &str); 2] = [
    (
        "Harvard University",
        "Mathematics",
        "John",
        "Smith",
        "JS@example.com",
        "1995-03-14",
    ),
    (
        "Cambridge University",
        "Informatica",
        "Jon",
        "Doe",
        "JD@example.com",
        "2000-09-02",
    ),
];

fn demo_students() -> Result<Vec<NewStudent>, chrono::ParseError> {
    DEMO_STUDENTS
        .iter()
        .map(|&(school, department, first, last, email, born)| {
            Ok(NewStudent {
                school_name: school.to_string(),
                department_name: department.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
                date_of_birth: NaiveDate::parse_from_str(born, "%Y-%m-%d")?,
                gender: Gender::Male,
            })
        })
        .collect()
}

fn seed(service: &SqliteService<'_>) -> Result<(), Box<dyn Error>> {
    for (school, departments) in DEMO_SCHOOLS {
        skip_existing(service.add_school(school, None))?;
        for department in departments {
            skip_existing(service.add_department_to_school(school, department))?;
        }
    }
    for request in demo_students()? {
        skip_existing(service.add_student_to_school(&request))?;
    }
    info!("event=seed module=cli status=ok");
    println!("seeded demo registry");
    Ok(())
}

/// Re-seeding an existing database leaves present rows untouched.
fn skip_existing<T>(result: ServiceResult<T>) -> ServiceResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err @ ServiceError::AlreadyExists { .. }) => {
            warn!("event=seed module=cli status=skipped reason=\"{err}\"");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn report(service: &SqliteService<'_>) -> ServiceResult<()> {
    println!("schools:");
    for school in service.schools_with_all_departments()? {
        let departments: Vec<&str> = school
            .departments
            .iter()
            .map(|department| department.name.as_str())
            .collect();
        println!("  {} [{}]", school.name, departments.join(", "));
    }

    println!("students per school:");
    for school in service.schools_by_student_count()? {
        println!("  {}: {}", school.name, school.student_count);
    }

    println!("students per department:");
    for department in service.department_student_counts()? {
        println!("  {}: {}", department.name, department.student_count);
    }

    println!("most popular department:");
    for department in service.most_popular_department()? {
        println!("  {} ({} students)", department.name, department.student_count);
    }

    println!("male students:");
    for student in service.find_students_by_gender(Gender::Male)? {
        println!(
            "  {} <{}> age {} in {}",
            student.full_name, student.email, student.age, student.department_name
        );
    }
    info!("event=report module=cli status=ok");
    Ok(())
}
