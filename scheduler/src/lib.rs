//! A single scheduler instance runs every periodic and one-off background
//! job in the orchestrator — cron rotation, the rotation sweep, retention
//! sweeps, seal-triggered index builds, and progress-tracked transfers —
//! under one configurable concurrency cap. It owns one background timer
//! task per cron job rather than delegating to an external cron daemon, and
//! starts eagerly at construction so `run_once`/`submit` work before the
//! orchestrator itself starts.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod error;
mod job;

pub use error::SchedulerError;
pub use job::{JobFn, JobSchedule, JobSummary};

use chrono::Utc;
use data_types::JobId;
use job::JobEntry;
use metric::{Attributes, I64Gauge, Metric, Registry, U64Counter};
use observability_deps::tracing::{info, warn};
use parking_lot::RwLock;
use std::{collections::HashMap, str::FromStr, sync::Arc, time::Duration};
use time_provider::TimeProvider;
use tokio_util::sync::CancellationToken;
use tracker::{AsyncSemaphore, JobProgress};

/// How long a completed one-shot job's entry is kept around for `list_jobs`
/// before being garbage collected.
const ONE_SHOT_GC_GRACE: Duration = Duration::from_secs(60 * 60);

struct Inner {
    jobs: RwLock<HashMap<String, Arc<RwLock<JobEntry>>>>,
    semaphore: RwLock<AsyncSemaphore>,
    cancel: CancellationToken,
    time_provider: Arc<dyn TimeProvider>,
    jobs_run: Metric<U64Counter>,
    jobs_running: Metric<I64Gauge>,
}

/// Parses a standard 5-field cron expression (`minute hour dom month dow`).
fn parse_cron(expr: &str) -> Result<cron::Schedule, SchedulerError> {
    if expr.split_whitespace().count() != 5 {
        return Err(SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: "expected 5 fields: minute hour day-of-month month day-of-week".to_string(),
        });
    }
    // The `cron` crate's grammar carries a leading seconds field; standard
    // 5-field expressions always run at second zero.
    let six_field = format!("0 {expr}");
    cron::Schedule::from_str(&six_field).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Handle to the shared job scheduler.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("jobs", &self.jobs.read().len())
            .finish()
    }
}

impl Scheduler {
    /// Constructs and starts the scheduler immediately, with `max_concurrent`
    /// job slots.
    pub fn new(max_concurrent: usize, time_provider: Arc<dyn TimeProvider>, registry: &Registry) -> Self {
        let jobs_run = registry.register_metric("scheduler_jobs_run", "jobs completed, by outcome");
        let jobs_running = registry.register_metric("scheduler_jobs_running", "jobs currently executing");

        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                semaphore: RwLock::new(AsyncSemaphore::new(max_concurrent)),
                cancel: CancellationToken::new(),
                time_provider,
                jobs_run,
                jobs_running,
            }),
        }
    }

    /// Registers a recurring cron job. The name must be unique across the
    /// scheduler.
    pub fn add_job(
        &self,
        name: impl Into<String>,
        cron_expr: &str,
        func: JobFn,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        let schedule = parse_cron(cron_expr)?;

        let mut jobs = self.inner.jobs.write();
        if jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        let entry = Arc::new(RwLock::new(JobEntry {
            id: JobId::new(),
            name: name.clone(),
            description: None,
            schedule: JobSchedule::Cron {
                schedule: schedule.clone(),
                source: cron_expr.to_string(),
            },
            progress: Arc::new(JobProgress::new(0)),
            cancel: CancellationToken::new(),
            func,
        }));

        jobs.insert(name.clone(), Arc::clone(&entry));
        drop(jobs);

        self.spawn_cron_loop(name, schedule, entry);
        Ok(())
    }

    /// Registers a recurring job that fires on a fixed wall-clock interval,
    /// for periodic work finer-grained than cron's minute resolution (e.g.
    /// the rotation sweep). The name must be unique across the scheduler.
    pub fn add_interval_job(
        &self,
        name: impl Into<String>,
        interval: Duration,
        func: JobFn,
    ) -> Result<(), SchedulerError> {
        let name = name.into();

        let mut jobs = self.inner.jobs.write();
        if jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        let entry = Arc::new(RwLock::new(JobEntry {
            id: JobId::new(),
            name: name.clone(),
            description: None,
            schedule: JobSchedule::Interval(interval),
            progress: Arc::new(JobProgress::new(0)),
            cancel: CancellationToken::new(),
            func,
        }));

        jobs.insert(name.clone(), Arc::clone(&entry));
        drop(jobs);

        self.spawn_interval_loop(name, interval, entry);
        Ok(())
    }

    /// Idempotent removal: cancels the job's own cancellation token (ending
    /// its timer loop or in-flight wait) and drops its registry entry.
    pub fn remove_job(&self, name: &str) {
        if let Some(entry) = self.inner.jobs.write().remove(name) {
            entry.read().cancel.cancel();
            info!(job = name, "removed scheduled job");
        }
    }

    /// Atomic remove-then-add.
    pub fn update_job(
        &self,
        name: impl Into<String>,
        cron_expr: &str,
        func: JobFn,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        self.remove_job(&name);
        self.add_job(name, cron_expr, func)
    }

    pub fn has_job(&self, name: &str) -> bool {
        self.inner.jobs.read().contains_key(name)
    }

    /// Attaches a human label to a registered job, for UI display.
    pub fn describe(&self, name: &str, text: impl Into<String>) -> Result<(), SchedulerError> {
        let jobs = self.inner.jobs.read();
        let entry = jobs.get(name).ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
        entry.write().description = Some(text.into());
        Ok(())
    }

    /// Lists every registered job, lazily garbage-collecting completed
    /// one-shots older than the GC grace period.
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        let now = self.inner.time_provider.now();
        let mut jobs = self.inner.jobs.write();

        jobs.retain(|_, entry| {
            let entry = entry.read();
            if matches!(entry.schedule, JobSchedule::Once { .. }) && entry.progress.is_terminal() {
                let elapsed = entry
                    .progress
                    .completed_at()
                    .and_then(|completed| now.checked_duration_since(completed));
                !matches!(elapsed, Some(elapsed) if elapsed >= ONE_SHOT_GC_GRACE)
            } else {
                true
            }
        });

        jobs.values()
            .map(|entry| {
                let entry = entry.read();
                JobSummary {
                    id: entry.id,
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    schedule: match &entry.schedule {
                        JobSchedule::Cron { source, .. } => source.clone(),
                        JobSchedule::Interval(d) => format!("every {}s", d.as_secs()),
                        JobSchedule::Once { .. } => "once".to_string(),
                    },
                    status: entry.progress.status(),
                }
            })
            .collect()
    }

    /// Queues a one-shot job that runs as soon as a slot is free. Unlike
    /// `submit`, the entry is removed the instant it finishes — nothing
    /// lingers for `list_jobs` to report on.
    pub fn run_once(&self, name: impl Into<String>, func: JobFn) -> Result<(), SchedulerError> {
        self.submit_inner(name, func, false).map(|_| ())
    }

    /// Queues a one-shot job with `JobProgress` tracking, returning the
    /// progress handle immediately so the caller can poll it through
    /// `list_jobs` or hold onto it directly. The entry lingers in
    /// `list_jobs` for the GC grace period after it completes.
    pub fn submit(&self, name: impl Into<String>, func: JobFn) -> Result<Arc<JobProgress>, SchedulerError> {
        self.submit_inner(name, func, true)
    }

    fn submit_inner(
        &self,
        name: impl Into<String>,
        func: JobFn,
        linger: bool,
    ) -> Result<Arc<JobProgress>, SchedulerError> {
        let name = name.into();

        let mut jobs = self.inner.jobs.write();
        if jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        let progress = Arc::new(JobProgress::new(0));
        let entry = Arc::new(RwLock::new(JobEntry {
            id: JobId::new(),
            name: name.clone(),
            description: None,
            schedule: JobSchedule::Once { linger },
            progress: Arc::clone(&progress),
            cancel: CancellationToken::new(),
            func,
        }));
        jobs.insert(name.clone(), Arc::clone(&entry));
        drop(jobs);

        self.spawn_once(name, entry, linger);
        Ok(progress)
    }

    /// Tears down and rebuilds the scheduler with a new concurrency limit.
    /// In-flight jobs keep the semaphore permit they already hold; only new
    /// acquisitions observe the new limit.
    pub fn rebuild(&self, max_concurrent: usize) {
        *self.inner.semaphore.write() = AsyncSemaphore::new(max_concurrent);
    }

    /// Cancels every job's cancellation token. Cron timer loops and
    /// in-flight slot waits exit promptly; already-running job bodies are
    /// not interrupted, only awaited cooperatively by the caller.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
        for entry in self.inner.jobs.read().values() {
            entry.read().cancel.cancel();
        }
    }

    fn spawn_cron_loop(&self, name: String, schedule: cron::Schedule, entry: Arc<RwLock<JobEntry>>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let cancel = entry.read().cancel.clone();
                let wait = match schedule.upcoming(Utc).next() {
                    Some(next) => (next - Utc::now()).to_std().unwrap_or(Duration::ZERO),
                    None => return,
                };

                tokio::select! {
                    _ = inner.cancel.cancelled() => return,
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(wait) => {}
                }

                let semaphore = inner.semaphore.read().clone();
                let Some(permit) = semaphore.acquire(&cancel).await else {
                    return;
                };

                let progress = Arc::new(JobProgress::new(0));
                entry.write().progress = Arc::clone(&progress);
                run_job(&inner, &name, &entry, progress).await;
                drop(permit);
            }
        });
    }

    fn spawn_interval_loop(&self, name: String, interval: Duration, entry: Arc<RwLock<JobEntry>>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let cancel = entry.read().cancel.clone();

                tokio::select! {
                    _ = inner.cancel.cancelled() => return,
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }

                let semaphore = inner.semaphore.read().clone();
                let Some(permit) = semaphore.acquire(&cancel).await else {
                    return;
                };

                let progress = Arc::new(JobProgress::new(0));
                entry.write().progress = Arc::clone(&progress);
                run_job(&inner, &name, &entry, progress).await;
                drop(permit);
            }
        });
    }

    fn spawn_once(&self, name: String, entry: Arc<RwLock<JobEntry>>, linger: bool) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let cancel = entry.read().cancel.clone();
            let semaphore = inner.semaphore.read().clone();
            let Some(permit) = semaphore.acquire(&cancel).await else {
                inner.jobs.write().remove(&name);
                return;
            };

            let progress = Arc::clone(&entry.read().progress);
            run_job(&inner, &name, &entry, progress).await;
            drop(permit);

            // `run_once` jobs (`linger == false`) are removed immediately;
            // `submit` jobs linger for the GC grace period so `list_jobs`
            // can still report their terminal state, swept by the `retain`
            // in `list_jobs` above.
            if !linger {
                inner.jobs.write().remove(&name);
            }
        });
    }
}

async fn run_job(
    inner: &Inner,
    name: &str,
    entry: &Arc<RwLock<JobEntry>>,
    progress: Arc<JobProgress>,
) {
    let now = inner.time_provider.now();
    progress.start(now);
    inner.jobs_running.recorder(Attributes::new()).inc(1);

    let func = Arc::clone(&entry.read().func);
    let result = func(Arc::clone(&progress)).await;

    inner.jobs_running.recorder(Attributes::new()).dec(1);
    let now = inner.time_provider.now();

    match result {
        Ok(()) => {
            progress.complete(now);
            inner
                .jobs_run
                .recorder(&[("outcome", "completed")][..])
                .inc(1);
        }
        Err(e) => {
            warn!(job = name, error = %e, "scheduled job failed");
            progress.fail(now, e);
            inner
                .jobs_run
                .recorder(&[("outcome", "failed")][..])
                .inc(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time_provider::{MockProvider, Time};

    fn scheduler() -> (Scheduler, Registry) {
        let registry = Registry::new();
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let scheduler = Scheduler::new(2, clock, &registry);
        (scheduler, registry)
    }

    #[tokio::test]
    async fn run_once_executes_and_auto_removes() {
        let (scheduler, _registry) = scheduler();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);

        scheduler
            .run_once(
                "index-build:1",
                Arc::new(move |_progress| {
                    let ran = Arc::clone(&ran2);
                    Box::pin(async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .unwrap();

        // Give the spawned task a chance to run and clean itself up.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!scheduler.has_job("index-build:1"));
    }

    #[tokio::test]
    async fn submitted_job_lingers_until_gc_grace_elapses() {
        let registry = Registry::new();
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let scheduler = Scheduler::new(2, Arc::clone(&clock) as Arc<dyn TimeProvider>, &registry);

        scheduler
            .submit("migrate:1", Arc::new(|_p| Box::pin(async { Ok(()) })))
            .unwrap();

        // Give the spawned task a chance to run to completion.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Still present right after completion: submitted jobs linger, unlike run_once.
        assert!(scheduler.list_jobs().iter().any(|j| j.name == "migrate:1"));
        assert!(scheduler.has_job("migrate:1"));

        clock.inc(ONE_SHOT_GC_GRACE);

        // The next list_jobs sweep garbage-collects it once the grace period has elapsed.
        assert!(!scheduler.list_jobs().iter().any(|j| j.name == "migrate:1"));
        assert!(!scheduler.has_job("migrate:1"));
    }

    #[tokio::test]
    async fn duplicate_job_name_is_rejected() {
        let (scheduler, _registry) = scheduler();
        scheduler
            .submit("migrate:1", Arc::new(|_p| Box::pin(async { Ok(()) })))
            .unwrap();

        let err = scheduler
            .submit("migrate:1", Arc::new(|_p| Box::pin(async { Ok(()) })))
            .unwrap_err();
        assert_eq!(err, SchedulerError::DuplicateJob("migrate:1".to_string()));
    }

    #[test]
    fn rejects_non_five_field_cron_expressions() {
        let err = parse_cron("* * *").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    }

    #[test]
    fn accepts_standard_five_field_cron_expressions() {
        assert!(parse_cron("*/15 * * * *").is_ok());
    }
}
