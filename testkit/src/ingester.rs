use async_trait::async_trait;
use collaborators::{IngestMessage, Ingester};
use data_types::IngesterId;
use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// An [`Ingester`] that emits a fixed, pre-built sequence of messages and
/// then returns, for exercising the dispatcher and orchestrator without a
/// real source adapter.
#[derive(Debug)]
pub struct ScriptedIngester {
    id: IngesterId,
    messages: Mutex<Vec<IngestMessage>>,
}

impl ScriptedIngester {
    pub fn new(messages: Vec<IngestMessage>) -> Self {
        Self {
            id: IngesterId::new(),
            messages: Mutex::new(messages),
        }
    }

    pub fn with_id(id: IngesterId, messages: Vec<IngestMessage>) -> Self {
        Self {
            id,
            messages: Mutex::new(messages),
        }
    }
}

#[async_trait]
impl Ingester for ScriptedIngester {
    fn id(&self) -> IngesterId {
        self.id
    }

    async fn run(&self, out: Sender<IngestMessage>, cancel: CancellationToken) {
        let script = std::mem::take(&mut *self.messages.lock());
        for msg in script {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = out.send(msg) => {
                    if result.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
