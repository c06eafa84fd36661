use collaborators::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("invalid age expression '{expr}', expected e.g. '72h' or '30d'")]
    InvalidAge { expr: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
