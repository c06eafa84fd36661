//! Moves data between vaults: a record-level copy for general use and a
//! filesystem-level chunk move when both vaults support the `ChunkMover`
//! capability. `migrate_vault`/`merge_vaults` compose these into a single
//! scheduler-tracked job.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod error;

pub use error::TransferError;

use collaborators::{ChunkManager, ChunkMover, IndexManager};
use data_types::ChunkId;
use observability_deps::tracing::warn;
use std::sync::Arc;
use tracker::JobProgress;
use uuid::Uuid;

/// One vault's collaborator set, as far as transfers need to see it.
#[derive(Clone)]
pub struct VaultHandle {
    pub id: Uuid,
    pub chunks: Arc<dyn ChunkManager>,
    pub indexes: Arc<dyn IndexManager>,
    /// Present only if this vault's chunk manager supports filesystem-level
    /// moves.
    pub mover: Option<Arc<dyn ChunkMover>>,
}

impl std::fmt::Debug for VaultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultHandle")
            .field("id", &self.id)
            .field("has_mover", &self.mover.is_some())
            .finish()
    }
}

/// Copies every record from `src` into `dst`, preserving original
/// timestamps, then seals and indexes whatever landed in `dst`.
pub async fn copy_records(
    src: &VaultHandle,
    dst: &VaultHandle,
    progress: &JobProgress,
) -> Result<(), TransferError> {
    let chunks = src.chunks.list().await?;
    progress.inc_chunks_done(0);

    for chunk in &chunks {
        let mut cursor = src.chunks.open_cursor(chunk.id).await?;
        while let Some(record) = cursor.next() {
            dst.chunks.append_preserved(record).await?;
            progress.inc_records_done(1);
        }
        progress.inc_chunks_done(1);
    }

    if dst.chunks.active().await.is_some() {
        dst.chunks.seal().await?;
    }

    for chunk in dst.chunks.list().await? {
        if chunk.sealed {
            if let Err(e) = dst.indexes.build_indexes(chunk.id).await {
                warn!(chunk_id = %chunk.id, error = %e, "failed to schedule post-copy index build");
            }
        }
    }

    Ok(())
}

/// Moves every sealed chunk from `src` to `dst` at the filesystem level.
/// Both vaults must carry the `ChunkMover` capability.
pub async fn move_chunks(
    src: &VaultHandle,
    dst: &VaultHandle,
    progress: &JobProgress,
) -> Result<(), TransferError> {
    let (src_mover, dst_mover) = match (&src.mover, &dst.mover) {
        (Some(s), Some(d)) => (s, d),
        _ => return Err(TransferError::NoChunkMoverCapability),
    };

    let chunks: Vec<ChunkId> = src
        .chunks
        .list()
        .await?
        .into_iter()
        .filter(|c| c.sealed)
        .map(|c| c.id)
        .collect();

    for chunk_id in chunks {
        let dir = src_mover.chunk_dir(chunk_id).await?;
        src_mover.disown(chunk_id).await?;

        match dst_mover.adopt(chunk_id, dir.clone()).await {
            Ok(()) => {
                progress.inc_chunks_done(1);
                if let Err(e) = dst.indexes.build_indexes(chunk_id).await {
                    warn!(chunk_id = %chunk_id, error = %e, "failed to schedule post-move index build");
                }
            }
            Err(e) => {
                warn!(chunk_id = %chunk_id, error = %e, "chunk move failed, attempting to reinstate in source");
                if let Err(reinstate_err) = src_mover.adopt(chunk_id, dir).await {
                    warn!(chunk_id = %chunk_id, error = %reinstate_err, "failed to reinstate chunk after failed move");
                }
                progress.record_error(format!("move failed for chunk {chunk_id}: {e}"));
            }
        }
    }

    Ok(())
}

/// Migrates all data from `src` into `dst`: moves at the filesystem level
/// when both vaults support it, otherwise falls back to a record copy. The
/// caller must have already disabled `src` before calling this. `cleanup`
/// runs after a successful migration (typically removing the source vault
/// from the registry).
pub async fn migrate_vault(
    src: &VaultHandle,
    dst: &VaultHandle,
    progress: &JobProgress,
    cleanup: impl FnOnce() + Send,
) -> Result<(), TransferError> {
    if src.chunks.active().await.is_some() {
        src.chunks.seal().await?;
    }

    if src.mover.is_some() && dst.mover.is_some() {
        move_chunks(src, dst, progress).await?;
    } else {
        copy_records(src, dst, progress).await?;
    }

    cleanup();
    Ok(())
}

/// Merges `sources` into `dst` one at a time, using the same move-vs-copy
/// selection as [`migrate_vault`].
pub async fn merge_vaults(
    sources: &[VaultHandle],
    dst: &VaultHandle,
    progress: &JobProgress,
    mut cleanup: impl FnMut(Uuid) + Send,
) -> Result<(), TransferError> {
    for src in sources {
        let src_id = src.id;
        migrate_vault(src, dst, progress, || cleanup(src_id)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaborators::{CollaboratorError, Record};
    use data_types::ChunkMeta;
    use parking_lot::Mutex;
    use time_provider::Time;

    #[derive(Debug, Default)]
    struct FakeChunks {
        records: Mutex<Vec<Record>>,
        sealed: Mutex<Vec<ChunkId>>,
    }

    #[async_trait::async_trait]
    impl ChunkManager for FakeChunks {
        async fn append(&self, r: Record) -> Result<(ChunkId, u64), CollaboratorError> {
            self.records.lock().push(r);
            Ok((ChunkId::new(), 0))
        }
        async fn append_preserved(&self, r: Record) -> Result<(ChunkId, u64), CollaboratorError> {
            self.records.lock().push(r);
            Ok((ChunkId::new(), 0))
        }
        async fn active(&self) -> Option<ChunkMeta> {
            None
        }
        async fn seal(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn list(&self) -> Result<Vec<ChunkMeta>, CollaboratorError> {
            Ok(self
                .sealed
                .lock()
                .iter()
                .map(|&id| ChunkMeta {
                    id,
                    start: Time::from_timestamp_nanos(0),
                    end: Time::from_timestamp_nanos(0),
                    record_count: 1,
                    byte_size: 1,
                    sealed: true,
                })
                .collect())
        }
        async fn meta(&self, _id: ChunkId) -> Result<Option<ChunkMeta>, CollaboratorError> {
            Ok(None)
        }
        async fn delete(&self, _id: ChunkId) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn open_cursor(
            &self,
            _id: ChunkId,
        ) -> Result<Box<dyn collaborators::RecordCursor>, CollaboratorError> {
            struct Cur(Vec<Record>);
            impl collaborators::RecordCursor for Cur {
                fn next(&mut self) -> Option<Record> {
                    self.0.pop()
                }
            }
            Ok(Box::new(Cur(self.records.lock().clone())))
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

    #[tokio::test]
    async fn copy_records_preserves_every_record() {
        let chunk_id = ChunkId::new();
        let src = VaultHandle {
            id: Uuid::from_u128(1),
            chunks: Arc::new(FakeChunks {
                records: Mutex::new(vec![Record {
                    source_ts: Time::from_timestamp_nanos(1),
                    ingest_ts: Time::from_timestamp_nanos(2),
                    attrs: data_types::Attrs::new(),
                    raw: vec![9],
                }]),
                sealed: Mutex::new(vec![chunk_id]),
            }),
            indexes: Arc::new(FakeIndexes),
            mover: None,
        };
        let dst_chunks = Arc::new(FakeChunks::default());
        let dst = VaultHandle {
            id: Uuid::from_u128(2),
            chunks: dst_chunks.clone(),
            indexes: Arc::new(FakeIndexes),
            mover: None,
        };

        let progress = JobProgress::new(0);
        copy_records(&src, &dst, &progress).await.unwrap();

        assert_eq!(dst_chunks.records.lock().len(), 1);
        assert_eq!(progress.records_done(), 1);
    }

    #[tokio::test]
    async fn move_chunks_without_capability_errors() {
        let vault = |id| VaultHandle {
            id,
            chunks: Arc::new(FakeChunks::default()) as Arc<dyn ChunkManager>,
            indexes: Arc::new(FakeIndexes),
            mover: None,
        };
        let progress = JobProgress::new(0);
        let err = move_chunks(&vault(Uuid::from_u128(1)), &vault(Uuid::from_u128(2)), &progress)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NoChunkMoverCapability));
    }
}
