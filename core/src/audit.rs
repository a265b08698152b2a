//! Audit fields embedded in every persisted entity.

use crate::types::Timestamp;
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Wall clock at the microsecond precision the store keeps.
pub fn stamp() -> Timestamp {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub created_by: String,
    pub created_at: Timestamp,
    pub last_modified_by: String,
    pub last_modified_at: Timestamp,
}

impl AuditMetadata {
    pub fn created(by: &str, at: Timestamp) -> Self {
        Self {
            created_by: by.to_string(),
            created_at: at,
            last_modified_by: by.to_string(),
            last_modified_at: at,
        }
    }

    /// Stamp a new entity with the wall clock.
    pub fn now(by: &str) -> Self {
        Self::created(by, stamp())
    }

    /// Keep the creation stamp, replace the modification stamp.
    pub fn modified(&self, by: &str, at: Timestamp) -> Self {
        Self {
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            last_modified_by: by.to_string(),
            last_modified_at: at,
        }
    }
}
