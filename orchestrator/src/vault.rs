use collaborators::{ChunkManager, ChunkMover, CollaboratorError, IndexManager, QueryEngine, Record};
use data_types::ChunkId;
use std::sync::{atomic::{AtomicBool, Ordering}, Arc};
use uuid::Uuid;

/// One registered storage partition: its chunk store, indexes, query engine,
/// and optional filesystem-move capability, plus the enabled flag checked
/// before every append.
pub struct Vault {
    pub id: Uuid,
    pub name: String,
    pub chunks: Arc<dyn ChunkManager>,
    pub indexes: Arc<dyn IndexManager>,
    pub query: Arc<dyn QueryEngine>,
    pub mover: Option<Arc<dyn ChunkMover>>,
    enabled: AtomicBool,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled())
            .field("has_mover", &self.mover.is_some())
            .finish()
    }
}

impl Vault {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        chunks: Arc<dyn ChunkManager>,
        indexes: Arc<dyn IndexManager>,
        query: Arc<dyn QueryEngine>,
        mover: Option<Arc<dyn ChunkMover>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            chunks,
            indexes,
            query,
            mover,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Appends a record and detects whether the append sealed the
    /// previously-active chunk, by comparing `Chunks.Active()` before and
    /// after the call. Relies on appends being serialized per vault and
    /// sealing happening synchronously within `append` — both guaranteed by
    /// the `ChunkManager` contract.
    pub async fn append_with_seal_detection(
        &self,
        record: Record,
    ) -> Result<Option<ChunkId>, CollaboratorError> {
        let active = self.chunks.active().await;
        self.chunks.append(record).await?;
        let active_after = self.chunks.active().await;

        let sealed = match (active, active_after) {
            (Some(before), None) => Some(before.id),
            (Some(before), Some(after)) if before.id != after.id => Some(before.id),
            _ => None,
        };

        Ok(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaborators::RecordCursor;
    use data_types::ChunkMeta;
    use parking_lot::Mutex;
    use time_provider::Time;

    #[derive(Debug)]
    struct FixedChunks {
        active: Mutex<Option<ChunkMeta>>,
        next_active: Mutex<Option<Option<ChunkMeta>>>,
    }

    #[async_trait::async_trait]
    impl ChunkManager for FixedChunks {
        async fn append(&self, _r: Record) -> Result<(ChunkId, u64), CollaboratorError> {
            if let Some(next) = self.next_active.lock().take() {
                *self.active.lock() = next;
            }
            Ok((ChunkId::new(), 0))
        }
        async fn append_preserved(&self, r: Record) -> Result<(ChunkId, u64), CollaboratorError> {
            self.append(r).await
        }
        async fn active(&self) -> Option<ChunkMeta> {
            self.active.lock().clone()
        }
        async fn seal(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn list(&self) -> Result<Vec<ChunkMeta>, CollaboratorError> {
            Ok(vec![])
        }
        async fn meta(&self, _id: ChunkId) -> Result<Option<ChunkMeta>, CollaboratorError> {
            Ok(None)
        }
        async fn delete(&self, _id: ChunkId) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn open_cursor(&self, _id: ChunkId) -> Result<Box<dyn RecordCursor>, CollaboratorError> {
            unimplemented!()
        }
        async fn check_rotation(&self) -> Option<String> {
            None
        }
    }

    #[derive(Debug, Default)]
    struct NoopIndexes;
    #[async_trait::async_trait]
    impl IndexManager for NoopIndexes {
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
    struct NoopQuery;
    #[async_trait::async_trait]
    impl QueryEngine for NoopQuery {
        async fn search(&self, _q: &str) -> Result<Vec<collaborators::QueryResult>, CollaboratorError> {
            Ok(vec![])
        }
    }

    fn record() -> Record {
        Record {
            source_ts: Time::from_timestamp_nanos(1),
            ingest_ts: Time::from_timestamp_nanos(1),
            attrs: data_types::Attrs::new(),
            raw: vec![],
        }
    }

    fn meta(id: ChunkId) -> ChunkMeta {
        ChunkMeta {
            id,
            start: Time::from_timestamp_nanos(0),
            end: Time::from_timestamp_nanos(0),
            record_count: 1,
            byte_size: 1,
            sealed: false,
        }
    }

    #[tokio::test]
    async fn detects_seal_when_active_chunk_id_changes() {
        let first = ChunkId::new();
        let second = ChunkId::new();
        let chunks = Arc::new(FixedChunks {
            active: Mutex::new(Some(meta(first))),
            next_active: Mutex::new(Some(Some(meta(second)))),
        });
        let vault = Vault::new(
            Uuid::from_u128(1),
            "v",
            chunks,
            Arc::new(NoopIndexes),
            Arc::new(NoopQuery),
            None,
        );

        let sealed = vault.append_with_seal_detection(record()).await.unwrap();
        assert_eq!(sealed, Some(first));
    }

    #[tokio::test]
    async fn no_seal_when_active_chunk_is_unchanged() {
        let id = ChunkId::new();
        let chunks = Arc::new(FixedChunks {
            active: Mutex::new(Some(meta(id))),
            next_active: Mutex::new(None),
        });
        let vault = Vault::new(
            Uuid::from_u128(1),
            "v",
            chunks,
            Arc::new(NoopIndexes),
            Arc::new(NoopQuery),
            None,
        );

        let sealed = vault.append_with_seal_detection(record()).await.unwrap();
        assert_eq!(sealed, None);
    }
}
