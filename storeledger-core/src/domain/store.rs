//! Store domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// A physical store or branch belonging to a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub company_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for creating or renaming a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStore {
    pub name: String,
    #[serde(default)]
    pub company_id: String,
}

impl NewStore {
    pub fn new(name: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            company_id: company_id.into(),
        }
    }

    /// Trim the name and check it does not collide with an existing store
    pub fn validate(&mut self, existing: &[Store]) -> Result<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(Error::validation("Store name is required"));
        }
        if self.name.chars().count() > 100 {
            return Err(Error::validation("Store name cannot exceed 100 characters"));
        }
        let lowered = self.name.to_lowercase();
        if existing.iter().any(|s| s.name.to_lowercase() == lowered) {
            return Err(Error::conflict(format!("A store named '{}' already exists", self.name)));
        }
        Ok(())
    }
}
