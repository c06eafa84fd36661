//! Trait contracts for everything the orchestrator treats as an external
//! collaborator: chunk storage, the reverse indexes, the query engine,
//! source adapters, and configuration loading. The orchestrator core never
//! implements any of these itself — production implementations live outside
//! this workspace, and `testkit` provides in-memory fakes for tests.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod error;

pub use error::{CollaboratorError, CollaboratorErrorKind};

use async_trait::async_trait;
use data_types::{Attrs, ChunkId, ChunkMeta, IngesterId};
use std::fmt::Debug;
use time_provider::Time;
use tokio::sync::oneshot;
use uuid::Uuid;

/// The unit of work crossing the bounded ingest channel.
#[derive(Debug)]
pub struct IngestMessage {
    pub attrs: Attrs,
    pub raw: Vec<u8>,
    /// Wall time the event was generated at the source; zero if unknown.
    pub source_ts: Time,
    /// Wall time the ingester received the message; always set.
    pub ingest_ts: Time,
    /// Fires at most once, with the append outcome, if the sender wants one.
    pub ack: Option<oneshot::Sender<Result<(), CollaboratorError>>>,
}

impl IngestMessage {
    pub fn new(attrs: Attrs, raw: Vec<u8>, ingest_ts: Time) -> Self {
        Self {
            attrs,
            raw,
            source_ts: Time::from_timestamp_nanos(0),
            ingest_ts,
            ack: None,
        }
    }

    pub fn ack_once(&mut self, result: Result<(), CollaboratorError>) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(result);
        }
    }
}

/// A record as appended to a chunk. `write_ts` is assigned by the
/// `ChunkManager` implementation at append time, not by the pipeline.
#[derive(Debug, Clone)]
pub struct Record {
    pub source_ts: Time,
    pub ingest_ts: Time,
    pub attrs: Attrs,
    pub raw: Vec<u8>,
}

/// An iterator-like cursor over the records of one chunk, opened by
/// `ChunkManager::open_cursor`.
pub trait RecordCursor: Send {
    fn next(&mut self) -> Option<Record>;
}

/// Owns the append-only chunk storage of a single vault.
///
/// Appends to a given instance are serialized by the caller (the orchestrator
/// guarantees single-writer-per-vault); sealing, when it happens as a side
/// effect of an append, must happen synchronously within that call so the
/// orchestrator's before/after `active()` comparison is an exact seal
/// detector. `seal` is idempotent: calling it on an already-sealed chunk (or
/// when there is no active chunk) returns `Ok(())` rather than erroring, so
/// the periodic rotation sweep and the ingest-triggered path can race safely.
#[async_trait]
pub trait ChunkManager: Debug + Send + Sync {
    async fn append(&self, record: Record) -> Result<(ChunkId, u64), CollaboratorError>;

    /// Appends a record keeping the caller-supplied timestamps verbatim,
    /// used by transfers to preserve original `source_ts`/`ingest_ts`.
    async fn append_preserved(&self, record: Record) -> Result<(ChunkId, u64), CollaboratorError>;

    async fn active(&self) -> Option<ChunkMeta>;

    async fn seal(&self) -> Result<(), CollaboratorError>;

    async fn list(&self) -> Result<Vec<ChunkMeta>, CollaboratorError>;

    async fn meta(&self, id: ChunkId) -> Result<Option<ChunkMeta>, CollaboratorError>;

    async fn delete(&self, id: ChunkId) -> Result<(), CollaboratorError>;

    async fn open_cursor(
        &self,
        id: ChunkId,
    ) -> Result<Box<dyn RecordCursor>, CollaboratorError>;

    /// Returns a human-readable trigger name if the active chunk is due for
    /// rotation (age/size/cold policies), otherwise `None`. Used by the
    /// background rotation sweep.
    async fn check_rotation(&self) -> Option<String>;
}

/// Optional capability: a `ChunkManager` that supports filesystem-level
/// chunk moves between vaults, avoiding a read-everything-then-copy.
#[async_trait]
pub trait ChunkMover: Debug + Send + Sync {
    async fn chunk_dir(&self, id: ChunkId) -> Result<String, CollaboratorError>;
    async fn disown(&self, id: ChunkId) -> Result<(), CollaboratorError>;
    async fn adopt(&self, id: ChunkId, dir: String) -> Result<(), CollaboratorError>;
}

/// Owns the reverse indexes (token/attribute/KV) for a single vault.
///
/// `build_indexes` must deduplicate concurrent invocations for the same
/// chunk ID: a second caller while a build is in flight receives the shared
/// result rather than starting a redundant build.
#[async_trait]
pub trait IndexManager: Debug + Send + Sync {
    async fn build_indexes(&self, id: ChunkId) -> Result<(), CollaboratorError>;
    async fn delete_indexes(&self, id: ChunkId) -> Result<(), CollaboratorError>;
    async fn indexes_complete(&self, id: ChunkId) -> Result<bool, CollaboratorError>;
}

/// A single query result row, opaque beyond its chunk of origin.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub chunk_id: ChunkId,
    pub record: Record,
}

/// Opaque delegate for the query engine; the orchestrator never interprets
/// query results beyond streaming them back to a caller.
#[async_trait]
pub trait QueryEngine: Debug + Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<QueryResult>, CollaboratorError>;
}

/// A long-running producer of [`IngestMessage`]s, cancelled cooperatively.
#[async_trait]
pub trait Ingester: Debug + Send + Sync {
    fn id(&self) -> IngesterId;

    /// Emits messages on `out` until `cancel` fires, then returns. Must never
    /// panic; errors encountered while producing are the ingester's own
    /// concern (e.g. logged and retried), not surfaced to the orchestrator.
    async fn run(
        &self,
        out: tokio::sync::mpsc::Sender<IngestMessage>,
        cancel: tokio_util::sync::CancellationToken,
    );
}

/// An in-place enrichment step applied to every message before dispatch.
/// Digesters may set `source_ts` if it is still zero; they must never touch
/// `raw` or `ingest_ts`, and must never fail visibly — parse errors are
/// swallowed by the implementation.
pub trait Digester: Debug + Send + Sync {
    fn digest(&self, msg: &mut IngestMessage);
}

/// A route destination as resolved from configuration: a vault UUID plus an
/// optional remote node identifier (empty means local).
#[derive(Debug, Clone)]
pub struct RouteDestination {
    pub vault_id: Uuid,
    pub node_id: Option<String>,
}

/// A single named filter expression as stored in configuration.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub id: Uuid,
    pub expr: String,
}

/// A route entry: zero or more destinations, gated on an optional filter.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub id: Uuid,
    pub enabled: bool,
    pub destinations: Vec<RouteDestination>,
    pub filter_id: Option<Uuid>,
}

/// What to do with a chunk once it qualifies under a vault's retention
/// policy. Mirrors `retention::RetentionAction` without introducing a
/// dependency on that crate from here.
#[derive(Debug, Clone)]
pub enum RetentionActionConfig {
    Expire,
    Migrate { destination: Uuid },
}

/// One compiled-at-reload-time retention policy, e.g. `older_than: "72h"`.
#[derive(Debug, Clone)]
pub struct RetentionPolicyConfig {
    pub older_than: String,
    pub action: RetentionActionConfig,
}

/// A vault descriptor as resolved from configuration: identity, its filter
/// and cron-rotation references, and its retention policy list.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub id: Uuid,
    pub name: String,
    pub filter_id: Option<Uuid>,
    pub rotation_cron: Option<String>,
    pub retention: Vec<RetentionPolicyConfig>,
}

/// Resolved process configuration, as produced by a [`ConfigLoader`].
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub filters: Vec<FilterConfig>,
    pub routes: Vec<RouteConfig>,
    pub vaults: Vec<VaultConfig>,
    pub ingest_channel_size: Option<usize>,
    pub scheduler_concurrency: Option<usize>,
}

/// Resolves configuration on demand, e.g. for hot-reload operations that
/// need to re-read filter or policy definitions by UUID.
#[async_trait]
pub trait ConfigLoader: Debug + Send + Sync {
    async fn load(&self) -> Result<Config, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoopDigester;

    impl Digester for NoopDigester {
        fn digest(&self, _msg: &mut IngestMessage) {}
    }

    #[test]
    fn ack_once_consumes_the_sender() {
        let (tx, mut rx) = oneshot::channel();
        let mut msg = IngestMessage::new(Attrs::new(), vec![], Time::from_timestamp_nanos(1));
        msg.ack = Some(tx);

        msg.ack_once(Ok(()));
        assert!(msg.ack.is_none());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn digester_does_not_touch_raw_by_contract() {
        let digester = NoopDigester;
        let mut msg = IngestMessage::new(Attrs::new(), vec![1, 2, 3], Time::from_timestamp_nanos(1));
        digester.digest(&mut msg);
        assert_eq!(msg.raw, vec![1, 2, 3]);
    }
}
