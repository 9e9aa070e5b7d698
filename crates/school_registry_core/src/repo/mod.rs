//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define one generic CRUD contract plus per-entity query traits.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate entities before persistence.
//! - Read misses are `Ok(None)`; write misses are `RepoError::NotFound`.
//! - Repositories borrow an injected connection and never open their own.

pub mod department_repo;
pub mod generic;
pub mod school_repo;
pub mod student_repo;
