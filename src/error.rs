use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Job not found or already stopped: {0}")]
    NotFound(String),

    #[error("Job {active_job_id} is already active")]
    Conflict { active_job_id: String },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => JobError::StoreUnavailable(msg),
            StoreError::ActiveExists { job_id } => JobError::Conflict {
                active_job_id: job_id,
            },
            StoreError::NotFound(id) => JobError::NotFound(id.to_string()),
            StoreError::Archived(id) => JobError::NotFound(id.to_string()),
            StoreError::Corrupt(msg) => JobError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
