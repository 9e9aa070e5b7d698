//! Department domain model.

use super::validation::{require_text, ValidationError, MAX_NAME_CHARS};
use super::EntityId;
use serde::{Deserialize, Serialize};

/// Department belonging to exactly one school.
///
/// Department names are unique within their school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: Option<EntityId>,
    pub name: String,
    pub school_id: EntityId,
}

impl Department {
    /// Creates an unsaved department under `school_id`.
    pub fn new(name: impl Into<String>, school_id: EntityId) -> Self {
        Self {
            id: None,
            name: name.into(),
            school_id,
        }
    }

    /// Checks the name rule; the owning school is enforced by storage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("department name", &self.name, MAX_NAME_CHARS)
    }
}
