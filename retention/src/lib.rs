//! Per-vault retention sweeps. One [`RetentionRunner`] per vault applies
//! that vault's rules to its sealed chunks and either expires (deletes) or
//! migrates matching chunks to another vault.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod duration;
mod error;

pub use duration::parse_age;
pub use error::RetentionError;

use collaborators::{ChunkManager, IndexManager};
use data_types::{ChunkId, ChunkMeta};
use observability_deps::tracing::warn;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration as StdDuration};
use time_provider::TimeProvider;
use uuid::Uuid;

/// What happens to a chunk once it matches a rule's age predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionAction {
    Expire,
    Migrate { destination: Uuid },
}

/// A compiled policy: chunks qualify once their end time plus `older_than`
/// is before the sweep's `now`.
#[derive(Debug, Clone)]
pub struct RetentionRule {
    pub older_than: StdDuration,
    pub action: RetentionAction,
}

impl RetentionRule {
    /// Returns the chunk IDs, among `chunks`, that this rule matches.
    fn matching<'a>(&self, chunks: &'a [ChunkMeta], now: time_provider::Time) -> Vec<ChunkId> {
        chunks
            .iter()
            .filter(|c| c.sealed)
            .filter(|c| (c.end + self.older_than) <= now)
            .map(|c| c.id)
            .collect()
    }
}

/// Moves a sealed chunk between vaults, either via a filesystem-level move
/// (the `ChunkMover` capability) or a record-level copy-then-delete.
#[async_trait::async_trait]
pub trait ChunkMover: std::fmt::Debug + Send + Sync {
    async fn move_chunk(
        &self,
        chunk_id: ChunkId,
        src_vault: Uuid,
        dst_vault: Uuid,
    ) -> Result<(), RetentionError>;
}

/// Runs one vault's retention rules on a schedule. Rules are hot-swappable
/// via `set_rules`, guarded by `rules` so a sweep never observes a
/// half-updated rule set.
#[derive(Debug)]
pub struct RetentionRunner {
    vault_id: Uuid,
    rules: Mutex<Vec<RetentionRule>>,
    chunks: Arc<dyn ChunkManager>,
    indexes: Arc<dyn IndexManager>,
    mover: Arc<dyn ChunkMover>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RetentionRunner {
    pub fn new(
        vault_id: Uuid,
        rules: Vec<RetentionRule>,
        chunks: Arc<dyn ChunkManager>,
        indexes: Arc<dyn IndexManager>,
        mover: Arc<dyn ChunkMover>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            vault_id,
            rules: Mutex::new(rules),
            chunks,
            indexes,
            mover,
            time_provider,
        }
    }

    pub fn set_rules(&self, rules: Vec<RetentionRule>) {
        *self.rules.lock() = rules;
    }

    /// Runs one sweep: lists sealed chunks, applies rules in order (earlier
    /// rules win on overlap), and actions every matched chunk. Per-chunk
    /// failures are logged and do not abort the sweep.
    pub async fn run_once(&self) -> Result<(), RetentionError> {
        let now = self.time_provider.now();
        let mut chunks = self.chunks.list().await.map_err(RetentionError::Collaborator)?;
        chunks.sort_by_key(|c| c.start);

        let rules = self.rules.lock().clone();
        let mut seen = std::collections::HashSet::new();
        let mut actions = Vec::new();

        for rule in &rules {
            for id in rule.matching(&chunks, now) {
                if seen.insert(id) {
                    actions.push((id, rule.action.clone()));
                }
            }
        }

        for (chunk_id, action) in actions {
            match action {
                RetentionAction::Expire => {
                    if let Err(e) = self.indexes.delete_indexes(chunk_id).await {
                        warn!(vault_id = %self.vault_id, chunk_id = %chunk_id, error = %e, "failed to delete indexes before expiring chunk");
                    }
                    if let Err(e) = self.chunks.delete(chunk_id).await {
                        warn!(vault_id = %self.vault_id, chunk_id = %chunk_id, error = %e, "failed to delete expired chunk");
                    }
                }
                RetentionAction::Migrate { destination } => {
                    if let Err(e) = self.mover.move_chunk(chunk_id, self.vault_id, destination).await {
                        warn!(vault_id = %self.vault_id, chunk_id = %chunk_id, error = %e, "failed to migrate chunk");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaborators::{CollaboratorError, Record};
    use time_provider::{MockProvider, Time};

    #[derive(Debug, Default)]
    struct FakeChunks {
        chunks: Mutex<Vec<ChunkMeta>>,
        deleted: Mutex<Vec<ChunkId>>,
    }

    #[async_trait::async_trait]
    impl ChunkManager for FakeChunks {
        async fn append(&self, _r: Record) -> Result<(ChunkId, u64), CollaboratorError> {
            unimplemented!()
        }
        async fn append_preserved(&self, _r: Record) -> Result<(ChunkId, u64), CollaboratorError> {
            unimplemented!()
        }
        async fn active(&self) -> Option<ChunkMeta> {
            None
        }
        async fn seal(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn list(&self) -> Result<Vec<ChunkMeta>, CollaboratorError> {
            Ok(self.chunks.lock().clone())
        }
        async fn meta(&self, _id: ChunkId) -> Result<Option<ChunkMeta>, CollaboratorError> {
            Ok(None)
        }
        async fn delete(&self, id: ChunkId) -> Result<(), CollaboratorError> {
            self.deleted.lock().push(id);
            Ok(())
        }
        async fn open_cursor(
            &self,
            _id: ChunkId,
        ) -> Result<Box<dyn collaborators::RecordCursor>, CollaboratorError> {
            unimplemented!()
        }
        async fn check_rotation(&self) -> Option<String> {
            None
        }
    }

    #[derive(Debug, Default)]
    struct FakeIndexes;

    #[async_trait::async_trait]
    impl IndexManager for FakeIndexes {
        async fn build_indexes(&self, _id: ChunkId) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn delete_indexes(&self, _id: ChunkId) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn indexes_complete(&self, _id: ChunkId) -> Result<bool, CollaboratorError> {
            Ok(true)
        }
    }

    #[derive(Debug, Default)]
    struct FakeMover;

    #[async_trait::async_trait]
    impl ChunkMover for FakeMover {
        async fn move_chunk(&self, _id: ChunkId, _src: Uuid, _dst: Uuid) -> Result<(), RetentionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn expires_chunks_older_than_threshold() {
        let old_chunk = ChunkMeta {
            id: ChunkId::new(),
            start: Time::from_timestamp_nanos(0),
            end: Time::from_timestamp_nanos(0),
            record_count: 10,
            byte_size: 100,
            sealed: true,
        };
        let fresh_chunk = ChunkMeta {
            id: ChunkId::new(),
            start: Time::from_timestamp_nanos(0),
            end: Time::from_timestamp_nanos(0) + StdDuration::from_secs(3600 * 71),
            record_count: 10,
            byte_size: 100,
            sealed: true,
        };

        let chunks = Arc::new(FakeChunks {
            chunks: Mutex::new(vec![old_chunk.clone(), fresh_chunk.clone()]),
            deleted: Mutex::new(vec![]),
        });

        let clock = Arc::new(MockProvider::new(
            Time::from_timestamp_nanos(0) + StdDuration::from_secs(3600 * 72),
        ));

        let runner = RetentionRunner::new(
            Uuid::from_u128(1),
            vec![RetentionRule {
                older_than: parse_age("72h").unwrap(),
                action: RetentionAction::Expire,
            }],
            chunks.clone(),
            Arc::new(FakeIndexes),
            Arc::new(FakeMover),
            clock,
        );

        runner.run_once().await.unwrap();

        let deleted = chunks.deleted.lock().clone();
        assert_eq!(deleted, vec![old_chunk.id]);
    }
}
