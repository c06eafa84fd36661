use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// A concurrency limiter that grants permits in FIFO order (as guaranteed by
/// [`tokio::sync::Semaphore`]) and whose waiters can be cancelled.
///
/// Used by the shared scheduler to cap the number of jobs running at once;
/// a job waiting for a slot observes cancellation immediately rather than
/// holding a place in line forever. Permits are owned (tied to the
/// underlying `Arc`, not to a borrow of `self`) so a job task can hold one
/// across awaits after the scheduler has moved on to spawning the next job.
#[derive(Debug, Clone)]
pub struct AsyncSemaphore {
    inner: Arc<Semaphore>,
}

impl AsyncSemaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            inner: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Number of permits currently available.
    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }

    /// Waits for a permit, or returns `None` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.inner.clone().acquire_owned() => permit.ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_blocks_past_capacity() {
        let sem = AsyncSemaphore::new(1);
        let cancel = CancellationToken::new();

        let first = sem.acquire(&cancel).await;
        assert!(first.is_some());
        assert_eq!(sem.available_permits(), 0);
    }

    #[tokio::test]
    async fn acquire_returns_none_when_cancelled() {
        let sem = AsyncSemaphore::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(sem.acquire(&cancel).await.is_none());
    }
}
