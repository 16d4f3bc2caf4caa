use thiserror::Error;

use super::models::JobStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {0} is already in a terminal state")]
    AlreadyTerminal(String),

    #[error("Job {0} is still running")]
    AlreadyLive(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
