use collaborators::CollaboratorError;
use filterset::FilterError;
use scheduler::SchedulerError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator is already running")]
    AlreadyRunning,

    #[error("orchestrator is not running")]
    NotRunning,

    #[error("vault '{0}' not found")]
    VaultNotFound(Uuid),

    #[error("ingester '{0}' not found")]
    IngesterNotFound(Uuid),

    #[error("vault '{0}' is not empty")]
    VaultNotEmpty(Uuid),

    #[error("id '{0}' is already registered")]
    DuplicateId(Uuid),

    #[error("no ConfigLoader configured for this orchestrator")]
    NoConfigLoader,

    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Retention(#[from] retention::RetentionError),
}
