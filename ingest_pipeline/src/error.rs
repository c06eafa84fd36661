use collaborators::CollaboratorError;
use thiserror::Error;

/// Error surfaced from one dispatch cycle. On partial fan-out failure only
/// the last vault's error is kept (§7 propagation policy); earlier ones are
/// logged at `warn` and discarded.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("vault append failed: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl DispatchError {
    pub fn into_last_collaborator_error(self) -> CollaboratorError {
        match self {
            DispatchError::Collaborator(e) => e,
        }
    }
}
