use thiserror::Error;

/// Errors raised by the shared scheduler's registration and lookup
/// operations. Job *execution* failures live on the job's `JobProgress`
/// instead, since they don't prevent the caller's request from succeeding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("a job named '{0}' is already registered")]
    DuplicateJob(String),

    #[error("no job named '{0}' is registered")]
    JobNotFound(String),

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}
