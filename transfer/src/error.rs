use collaborators::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("both vaults must implement the ChunkMover capability to move chunks directly")]
    NoChunkMoverCapability,
}
