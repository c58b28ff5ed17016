use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;

/// Link between an authenticated user and their patient profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DatabaseError> for PatientError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => PatientError::NotFound,
            other => PatientError::Unavailable(other.to_string()),
        }
    }
}
