use async_trait::async_trait;
use collaborators::{CollaboratorError, QueryEngine, QueryResult};
use parking_lot::Mutex;

/// A [`QueryEngine`] that returns a fixed, caller-supplied result set for
/// every search, regardless of the query text.
#[derive(Debug, Default)]
pub struct FakeQueryEngine {
    results: Mutex<Vec<QueryResult>>,
}

impl FakeQueryEngine {
    pub fn new(results: Vec<QueryResult>) -> Self {
        Self {
            results: Mutex::new(results),
        }
    }

    pub fn set_results(&self, results: Vec<QueryResult>) {
        *self.results.lock() = results;
    }
}

#[async_trait]
impl QueryEngine for FakeQueryEngine {
    async fn search(&self, _query: &str) -> Result<Vec<QueryResult>, CollaboratorError> {
        Ok(self.results.lock().clone())
    }
}
