//! School domain model.
//!
//! # Invariants
//! - `name` is unique across schools (enforced by storage).
//! - Deleting a school removes its departments and their students.

use super::validation::{check_length, require_text, ValidationError, MAX_ADDRESS_CHARS, MAX_NAME_CHARS};
use super::EntityId;
use serde::{Deserialize, Serialize};

/// Top-level organisation owning departments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: Option<EntityId>,
    pub name: String,
    pub address: Option<String>,
}

impl School {
    /// Creates an unsaved school.
    pub fn new(name: impl Into<String>, address: Option<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            address,
        }
    }

    /// Validates field-level rules before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("school name", &self.name, MAX_NAME_CHARS)?;
        if let Some(address) = &self.address {
            check_length("school address", address, MAX_ADDRESS_CHARS)?;
        }
        Ok(())
    }
}
