//! The dispatch loop that drains the bounded ingest channel, runs the
//! digester chain, resolves destinations through the filter set, and
//! appends to each matching vault.
//!
//! A single dispatcher task processes messages sequentially: downstream
//! append is single-writer-per-vault, identity resolution is cheap, and
//! index scheduling is asynchronous, so parallelising the dispatcher would
//! add complexity without adding throughput.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod error;

pub use error::DispatchError;

use async_trait::async_trait;
use collaborators::{CollaboratorError, Digester, IngestMessage, Record};
use data_types::ChunkId;
use filterset::FilterSet;
use observability_deps::tracing::warn;
use parking_lot::RwLock;
use std::{fmt::Debug, sync::Arc};
use time_provider::{Time, TimeProvider};
use uuid::Uuid;

/// Appends a record to one local vault, reporting whether the append sealed
/// the previously-active chunk (returning that chunk's ID).
///
/// Implemented by the orchestrator's vault registry, which owns the
/// before/after `ChunkManager::active` comparison described for vault
/// append (this crate never talks to a `ChunkManager` directly).
#[async_trait]
pub trait VaultSink: Debug + Send + Sync {
    async fn append(
        &self,
        vault_id: Uuid,
        record: Record,
    ) -> Result<Option<ChunkId>, CollaboratorError>;

    /// Every locally registered, non-disabled vault ID. Used when the filter
    /// set has no entries at all, in which case a record fans out to every
    /// local vault rather than nowhere.
    fn all_local_vaults(&self) -> Vec<Uuid>;
}

/// Forwards a record to a remote node named by a filter's `node_id`.
#[async_trait]
pub trait Forwarder: Debug + Send + Sync {
    async fn forward(&self, vault_id: Uuid, node_id: &str, record: Record);
}

/// Notified when an append seals a chunk, so the caller can schedule an
/// index build. A message-passing equivalent (seal events on a channel) is
/// just as valid; this crate only needs the callback shape.
#[async_trait]
pub trait SealHandler: Debug + Send + Sync {
    async fn on_seal(&self, vault_id: Uuid, chunk_id: ChunkId);
}

/// Records per-ingester counters; implemented by the orchestrator against
/// its ingester registry's atomics and the metrics registry.
pub trait IngestStatsSink: Debug + Send + Sync {
    fn record_success(&self, ingester_id: Option<&str>, bytes: usize);
    fn record_error(&self, ingester_id: Option<&str>);
}

/// `true` once the channel is at or above 90% of its capacity, per the
/// admission-control predicate exposed to self-metrics.
pub fn queue_near_full(len: usize, capacity: usize) -> bool {
    capacity > 0 && (len as f64) >= (capacity as f64) * 0.9
}

/// Drains the ingest channel and fans records out to vaults.
#[derive(Debug)]
pub struct Dispatcher {
    receiver: tokio::sync::mpsc::Receiver<IngestMessage>,
    digesters: Vec<Arc<dyn Digester>>,
    filters: Arc<RwLock<FilterSet>>,
    sink: Arc<dyn VaultSink>,
    seal_handler: Arc<dyn SealHandler>,
    forwarder: Option<Arc<dyn Forwarder>>,
    stats: Arc<dyn IngestStatsSink>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: tokio::sync::mpsc::Receiver<IngestMessage>,
        digesters: Vec<Arc<dyn Digester>>,
        filters: Arc<RwLock<FilterSet>>,
        sink: Arc<dyn VaultSink>,
        seal_handler: Arc<dyn SealHandler>,
        forwarder: Option<Arc<dyn Forwarder>>,
        stats: Arc<dyn IngestStatsSink>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            receiver,
            digesters,
            filters,
            sink,
            seal_handler,
            forwarder,
            stats,
            time_provider,
        }
    }

    /// Runs until the channel is closed and drained. On cancellation the
    /// caller simply stops sending and drops its senders; this loop keeps
    /// reading until `recv` returns `None`, which is what guarantees no
    /// buffered message is lost on shutdown.
    pub async fn run(mut self) {
        while let Some(mut msg) = self.receiver.recv().await {
            for digester in &self.digesters {
                digester.digest(&mut msg);
            }
            if msg.source_ts.timestamp_nanos() == 0 {
                msg.source_ts = self.time_provider.now();
            }

            let record = Record {
                source_ts: msg.source_ts,
                ingest_ts: msg.ingest_ts,
                attrs: msg.attrs.clone(),
                raw: msg.raw.clone(),
            };

            let ingester_id = record.attrs.get("ingester_id").map(str::to_string);
            let result = self.dispatch(record).await;

            match &result {
                Ok(()) => self
                    .stats
                    .record_success(ingester_id.as_deref(), msg.raw.len()),
                Err(_) => self.stats.record_error(ingester_id.as_deref()),
            }

            msg.ack_once(result.map_err(|e| e.into_last_collaborator_error()));
        }
    }

    async fn dispatch(&self, record: Record) -> Result<(), DispatchError> {
        let filters = self.filters.read().clone();

        let destinations = if filters.is_empty() {
            self.sink
                .all_local_vaults()
                .into_iter()
                .map(|id| (id, None))
                .collect()
        } else {
            filters.matches_with_node(&record.attrs)
        };

        let mut last_error = None;

        for (vault_id, node_id) in destinations {
            if let Some(node_id) = node_id {
                if let Some(forwarder) = &self.forwarder {
                    forwarder.forward(vault_id, &node_id, record.clone()).await;
                }
                continue;
            }

            match self.sink.append(vault_id, record.clone()).await {
                Ok(Some(sealed_chunk)) => {
                    self.seal_handler.on_seal(vault_id, sealed_chunk).await;
                }
                Ok(None) => {}
                Err(e) => {
                    if let Some(prev) = last_error.replace(e) {
                        warn!(vault_id = %vault_id, error = %prev, "discarded earlier fan-out error");
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(DispatchError::Collaborator(e)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_types::Attrs;
    use filterset::CompiledFilter;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use time_provider::MockProvider;

    #[derive(Debug, Default)]
    struct FakeSink {
        appended: Mutex<Vec<Uuid>>,
        fail: Option<Uuid>,
    }

    #[async_trait]
    impl VaultSink for FakeSink {
        async fn append(
            &self,
            vault_id: Uuid,
            _record: Record,
        ) -> Result<Option<ChunkId>, CollaboratorError> {
            if Some(vault_id) == self.fail {
                return Err(CollaboratorError::unknown("boom"));
            }
            self.appended.lock().push(vault_id);
            Ok(None)
        }

        fn all_local_vaults(&self) -> Vec<Uuid> {
            vec![]
        }
    }

    #[derive(Debug, Default)]
    struct NoopSeal;

    #[async_trait]
    impl SealHandler for NoopSeal {
        async fn on_seal(&self, _vault_id: Uuid, _chunk_id: ChunkId) {}
    }

    #[derive(Debug, Default)]
    struct RecordingStats {
        successes: Mutex<HashMap<Option<String>, usize>>,
        errors: Mutex<usize>,
    }

    impl IngestStatsSink for RecordingStats {
        fn record_success(&self, ingester_id: Option<&str>, bytes: usize) {
            *self
                .successes
                .lock()
                .entry(ingester_id.map(str::to_string))
                .or_default() += bytes;
        }

        fn record_error(&self, _ingester_id: Option<&str>) {
            *self.errors.lock() += 1;
        }
    }

    fn vault(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn dispatch_fans_out_to_every_matching_vault() {
        let sink = Arc::new(FakeSink::default());
        let stats = Arc::new(RecordingStats::default());
        let filters = Arc::new(RwLock::new(
            FilterSet::new()
                .add_or_update(CompiledFilter::compile(vault(1), None, "*").unwrap()),
        ));

        let (tx, rx) = tokio::sync::mpsc::channel(10);
        let dispatcher = Dispatcher::new(
            rx,
            vec![],
            filters,
            sink.clone(),
            Arc::new(NoopSeal),
            None,
            stats.clone(),
            Arc::new(MockProvider::new(Time::from_timestamp_nanos(1))),
        );

        let handle = tokio::spawn(dispatcher.run());

        let mut attrs = Attrs::new();
        attrs.insert("ingester_id", "i1");
        tx.send(IngestMessage::new(attrs, vec![1, 2, 3], Time::from_timestamp_nanos(1)))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sink.appended.lock().clone(), vec![vault(1)]);
        assert_eq!(*stats.errors.lock(), 0);
    }

    #[test]
    fn queue_near_full_threshold() {
        assert!(!queue_near_full(89, 100));
        assert!(queue_near_full(90, 100));
        assert!(queue_near_full(100, 100));
    }
}
