use async_trait::async_trait;
use collaborators::{ChunkManager, CollaboratorError, Record, RecordCursor};
use data_types::{ChunkId, ChunkMeta};
use parking_lot::Mutex;
use std::collections::VecDeque;
use time_provider::{Time, TimeProvider};

/// When a [`FakeChunkManager`]'s active chunk should seal itself.
#[derive(Debug, Clone, Copy)]
pub enum RotationPolicy {
    /// Seals once the active chunk reaches this many records.
    RecordCount(u64),
    /// Never rotates automatically; the test must call `seal` explicitly.
    Manual,
}

#[derive(Debug)]
struct StoredChunk {
    meta: ChunkMeta,
    records: VecDeque<Record>,
}

#[derive(Debug)]
struct Inner {
    active: Option<StoredChunk>,
    sealed: Vec<StoredChunk>,
}

/// An in-memory [`ChunkManager`]: records live in `Vec`s keyed by chunk,
/// with a configurable rotation policy so tests can exercise seal detection
/// without real storage.
#[derive(Debug)]
pub struct FakeChunkManager {
    inner: Mutex<Inner>,
    policy: RotationPolicy,
    time_provider: std::sync::Arc<dyn TimeProvider>,
}

impl FakeChunkManager {
    pub fn new(policy: RotationPolicy, time_provider: std::sync::Arc<dyn TimeProvider>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: None,
                sealed: vec![],
            }),
            policy,
            time_provider,
        }
    }

    fn open_chunk(&self, now: Time) -> StoredChunk {
        StoredChunk {
            meta: ChunkMeta {
                id: ChunkId::new(),
                start: now,
                end: now,
                record_count: 0,
                byte_size: 0,
                sealed: false,
            },
            records: VecDeque::new(),
        }
    }

    pub fn sealed_chunk_count(&self) -> usize {
        self.inner.lock().sealed.len()
    }

    pub fn total_record_count(&self) -> u64 {
        let inner = self.inner.lock();
        let active = inner.active.as_ref().map(|c| c.meta.record_count).unwrap_or(0);
        active + inner.sealed.iter().map(|c| c.meta.record_count).sum::<u64>()
    }
}

struct FakeCursor {
    records: VecDeque<Record>,
}

impl RecordCursor for FakeCursor {
    fn next(&mut self) -> Option<Record> {
        self.records.pop_front()
    }
}

#[async_trait]
impl ChunkManager for FakeChunkManager {
    async fn append(&self, record: Record) -> Result<(ChunkId, u64), CollaboratorError> {
        let now = self.time_provider.now();
        let mut inner = self.inner.lock();

        if inner.active.is_none() {
            inner.active = Some(self.open_chunk(now));
        }

        let chunk = inner.active.as_mut().expect("just ensured Some");
        chunk.meta.end = now;
        chunk.meta.record_count += 1;
        chunk.meta.byte_size += record.raw.len() as u64;
        let id = chunk.meta.id;
        let position = chunk.meta.record_count;
        chunk.records.push_back(record);

        if let RotationPolicy::RecordCount(limit) = self.policy {
            if chunk.meta.record_count >= limit {
                let mut sealed = inner.active.take().expect("checked above");
                sealed.meta.sealed = true;
                inner.sealed.push(sealed);
            }
        }

        Ok((id, position))
    }

    async fn append_preserved(&self, record: Record) -> Result<(ChunkId, u64), CollaboratorError> {
        self.append(record).await
    }

    async fn active(&self) -> Option<ChunkMeta> {
        self.inner.lock().active.as_ref().map(|c| c.meta.clone())
    }

    async fn seal(&self) -> Result<(), CollaboratorError> {
        let mut inner = self.inner.lock();
        if let Some(mut chunk) = inner.active.take() {
            if chunk.meta.record_count > 0 {
                chunk.meta.sealed = true;
                inner.sealed.push(chunk);
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ChunkMeta>, CollaboratorError> {
        let inner = self.inner.lock();
        let mut metas: Vec<_> = inner.sealed.iter().map(|c| c.meta.clone()).collect();
        if let Some(active) = &inner.active {
            metas.push(active.meta.clone());
        }
        metas.sort_by_key(|m| m.start);
        Ok(metas)
    }

    async fn meta(&self, id: ChunkId) -> Result<Option<ChunkMeta>, CollaboratorError> {
        let inner = self.inner.lock();
        Ok(inner
            .sealed
            .iter()
            .chain(inner.active.iter())
            .find(|c| c.meta.id == id)
            .map(|c| c.meta.clone()))
    }

    async fn delete(&self, id: ChunkId) -> Result<(), CollaboratorError> {
        self.inner.lock().sealed.retain(|c| c.meta.id != id);
        Ok(())
    }

    async fn open_cursor(&self, id: ChunkId) -> Result<Box<dyn RecordCursor>, CollaboratorError> {
        let inner = self.inner.lock();
        let chunk = inner
            .sealed
            .iter()
            .chain(inner.active.iter())
            .find(|c| c.meta.id == id)
            .ok_or_else(|| CollaboratorError::not_found(format!("chunk {id} not found")))?;
        Ok(Box::new(FakeCursor {
            records: chunk.records.clone(),
        }))
    }

    async fn check_rotation(&self) -> Option<String> {
        let inner = self.inner.lock();
        let chunk = inner.active.as_ref()?;
        match self.policy {
            RotationPolicy::RecordCount(limit) if chunk.meta.record_count >= limit => {
                Some("record-count".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_types::Attrs;
    use std::sync::Arc;
    use time_provider::MockProvider;

    fn record(n: u8) -> Record {
        Record {
            source_ts: Time::from_timestamp_nanos(1),
            ingest_ts: Time::from_timestamp_nanos(1),
            attrs: Attrs::new(),
            raw: vec![n],
        }
    }

    #[tokio::test]
    async fn seals_once_record_count_limit_reached() {
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let chunks = FakeChunkManager::new(RotationPolicy::RecordCount(2), clock);

        chunks.append(record(1)).await.unwrap();
        assert!(chunks.active().await.is_some());

        chunks.append(record(2)).await.unwrap();
        assert!(chunks.active().await.is_none());
        assert_eq!(chunks.sealed_chunk_count(), 1);
    }

    #[tokio::test]
    async fn cursor_replays_every_appended_record() {
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let chunks = FakeChunkManager::new(RotationPolicy::Manual, clock);

        let (id, _) = chunks.append(record(1)).await.unwrap();
        chunks.append(record(2)).await.unwrap();
        chunks.seal().await.unwrap();

        let mut cursor = chunks.open_cursor(id).await.unwrap();
        assert_eq!(cursor.next().unwrap().raw, vec![1]);
        assert_eq!(cursor.next().unwrap().raw, vec![2]);
        assert!(cursor.next().is_none());
    }
}
