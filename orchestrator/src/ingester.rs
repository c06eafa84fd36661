use collaborators::Ingester;
use metric::{Attributes, Metric, U64Counter};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-ingester counters, read concurrently by API handlers and written by
/// the dispatcher; atomics rather than a mutex, per the observable-counter
/// design note.
#[derive(Debug, Default)]
pub struct IngesterStats {
    pub messages_ingested: AtomicU64,
    pub bytes_ingested: AtomicU64,
    pub errors: AtomicU64,
}

impl IngesterStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.messages_ingested.load(Ordering::Relaxed),
            self.bytes_ingested.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

/// A registered ingester's running state: its implementation, the cancel
/// token for its per-ingester sub-context, its counters, and (once started)
/// the join handle for its task.
pub struct IngesterEntry {
    pub ingester: Arc<dyn Ingester>,
    pub stats: Arc<IngesterStats>,
    pub cancel: CancellationToken,
    pub task: Option<JoinHandle<()>>,
    pub messages_metric: Metric<U64Counter>,
    pub bytes_metric: Metric<U64Counter>,
    pub errors_metric: Metric<U64Counter>,
}

impl std::fmt::Debug for IngesterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngesterEntry")
            .field("id", &self.ingester.id())
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl IngesterEntry {
    pub fn record_success(&self, bytes: usize) {
        self.stats.messages_ingested.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_ingested.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_metric.recorder(Attributes::new()).inc(1);
        self.bytes_metric.recorder(Attributes::new()).inc(bytes as u64);
    }

    pub fn record_error(&self) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        self.errors_metric.recorder(Attributes::new()).inc(1);
    }
}
