use data_types::JobId;
use futures::future::BoxFuture;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracker::JobProgress;

/// The work a registered job performs, given its own progress handle to
/// report against. Boxed so cron jobs, one-shots, and `Submit` jobs can all
/// be stored uniformly in the job registry.
pub type JobFn = Arc<dyn Fn(Arc<JobProgress>) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// How a registered job is scheduled.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    /// Fires repeatedly on a 5-field cron expression; `source` is the
    /// original text, retained for `ListJobs`.
    Cron { schedule: cron::Schedule, source: String },
    /// Fires repeatedly on a fixed wall-clock interval, for periodic work
    /// finer-grained than cron's minute resolution (the rotation sweep).
    Interval(Duration),
    /// Runs exactly once. `linger` is set by `submit` (not by `run_once`):
    /// when true, the entry survives completion so `list_jobs` can still
    /// report its terminal state until the GC grace period elapses; when
    /// false it is removed the moment it finishes.
    Once { linger: bool },
}

/// A registered job, independent of whether it is currently running.
pub struct JobEntry {
    pub id: JobId,
    pub name: String,
    pub description: Option<String>,
    pub schedule: JobSchedule,
    pub progress: Arc<JobProgress>,
    pub cancel: CancellationToken,
    pub func: JobFn,
}

impl std::fmt::Debug for JobEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schedule", &self.schedule)
            .finish()
    }
}

/// A snapshot of one job's state, as returned by `Scheduler::list_jobs`.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub description: Option<String>,
    pub schedule: String,
    pub status: tracker::JobStatus,
}
