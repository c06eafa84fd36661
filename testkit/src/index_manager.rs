use async_trait::async_trait;
use collaborators::{CollaboratorError, IndexManager};
use data_types::ChunkId;
use parking_lot::Mutex;
use std::{collections::HashSet, time::Duration};
use tokio::sync::Mutex as AsyncMutex;

/// An in-memory [`IndexManager`] that records which chunk IDs have been
/// built. An optional artificial delay lets a test observe a second
/// `build_indexes` call arriving while the first is still in flight.
#[derive(Debug)]
pub struct FakeIndexManager {
    built: Mutex<HashSet<ChunkId>>,
    build_calls: Mutex<Vec<ChunkId>>,
    delay: Duration,
    in_flight: AsyncMutex<()>,
}

impl Default for FakeIndexManager {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl FakeIndexManager {
    pub fn new(delay: Duration) -> Self {
        Self {
            built: Mutex::new(HashSet::new()),
            build_calls: Mutex::new(vec![]),
            delay,
            in_flight: AsyncMutex::new(()),
        }
    }

    pub fn build_call_count(&self) -> usize {
        self.build_calls.lock().len()
    }

    pub fn is_built(&self, id: ChunkId) -> bool {
        self.built.lock().contains(&id)
    }
}

#[async_trait]
impl IndexManager for FakeIndexManager {
    async fn build_indexes(&self, id: ChunkId) -> Result<(), CollaboratorError> {
        self.build_calls.lock().push(id);

        // Serializes concurrent builds of the same manager instance so a
        // test can assert the second caller observed the first one's
        // completed result rather than racing a duplicate build.
        let _guard = self.in_flight.lock().await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.built.lock().insert(id);
        Ok(())
    }

    async fn delete_indexes(&self, id: ChunkId) -> Result<(), CollaboratorError> {
        self.built.lock().remove(&id);
        Ok(())
    }

    async fn indexes_complete(&self, id: ChunkId) -> Result<bool, CollaboratorError> {
        Ok(self.built.lock().contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_built_chunk_ids() {
        let indexes = FakeIndexManager::default();
        let id = ChunkId::new();
        assert!(!indexes.is_built(id));
        indexes.build_indexes(id).await.unwrap();
        assert!(indexes.is_built(id));
        assert_eq!(indexes.build_call_count(), 1);
    }
}
