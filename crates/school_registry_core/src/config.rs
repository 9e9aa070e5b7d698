//! Environment-driven registry settings.
//!
//! # Responsibility
//! - Resolve database location and logging settings from the environment.
//! - Open the configured database through the `db` bootstrap.
//!
//! # Invariants
//! - Empty variables count as unset.
//! - Without a database path the registry runs on a private in-memory store.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::default_log_level;
use rusqlite::Connection;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "SCHOOL_REGISTRY_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "SCHOOL_REGISTRY_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "SCHOOL_REGISTRY_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// SQLite file; `None` means in-memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Rolling log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl RegistryConfig {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            db_path: read(DB_PATH_ENV).map(PathBuf::from),
            log_level: read(LOG_LEVEL_ENV).unwrap_or(defaults.log_level),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }

    /// Opens the configured database with migrations applied.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }
}
