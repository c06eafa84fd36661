use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use time_provider::Time;

/// Lifecycle state of a scheduler job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Running,
    Completed,
    Failed,
}

#[derive(Debug)]
struct Inner {
    status: JobStatus,
    chunks_total: u64,
    started: Option<Time>,
    completed: Option<Time>,
    error: Option<String>,
    error_detail: Vec<String>,
}

/// Mutable, thread-safe progress record attached to a long-running scheduler
/// job (an index build, a retention sweep, a migration). Counters are
/// updated concurrently by the job task and read concurrently by API
/// handlers listing jobs, so the hot counters use atomics while the
/// occasionally-written status fields sit behind a small mutex.
#[derive(Debug)]
pub struct JobProgress {
    chunks_done: AtomicU64,
    records_done: AtomicU64,
    errors: AtomicU64,
    inner: Mutex<Inner>,
}

impl JobProgress {
    pub fn new(chunks_total: u64) -> Self {
        Self {
            chunks_done: AtomicU64::new(0),
            records_done: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                status: JobStatus::Submitted,
                chunks_total,
                started: None,
                completed: None,
                error: None,
                error_detail: Vec::new(),
            }),
        }
    }

    pub fn start(&self, now: Time) {
        let mut inner = self.inner.lock();
        inner.status = JobStatus::Running;
        inner.started = Some(now);
    }

    pub fn inc_chunks_done(&self, delta: u64) {
        self.chunks_done.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_records_done(&self, delta: u64) {
        self.records_done.fetch_add(delta, Ordering::Relaxed);
    }

    /// Records a non-fatal error against the job without failing it; used
    /// when a sweep or transfer continues past a per-item failure.
    pub fn record_error(&self, detail: impl Into<String>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().error_detail.push(detail.into());
    }

    pub fn complete(&self, now: Time) {
        let mut inner = self.inner.lock();
        inner.status = JobStatus::Completed;
        inner.completed = Some(now);
    }

    pub fn fail(&self, now: Time, error: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.status = JobStatus::Failed;
        inner.completed = Some(now);
        inner.error = Some(error.into());
    }

    pub fn status(&self) -> JobStatus {
        self.inner.lock().status
    }

    pub fn chunks_total(&self) -> u64 {
        self.inner.lock().chunks_total
    }

    pub fn chunks_done(&self) -> u64 {
        self.chunks_done.load(Ordering::Relaxed)
    }

    pub fn records_done(&self) -> u64 {
        self.records_done.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status(), JobStatus::Completed | JobStatus::Failed)
    }

    pub fn completed_at(&self) -> Option<Time> {
        self.inner.lock().completed
    }
}
