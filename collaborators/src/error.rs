use std::fmt::{Display, Formatter};

/// Generic boxed error surfaced by a collaborator implementation, tagged
/// with a [`CollaboratorErrorKind`] so callers can branch on the failure
/// shape without downcasting the inner error.
#[derive(Debug)]
pub struct CollaboratorError {
    inner: Box<dyn std::error::Error + Sync + Send>,
    kind: CollaboratorErrorKind,
}

impl CollaboratorError {
    pub fn new(
        kind: CollaboratorErrorKind,
        e: impl Into<Box<dyn std::error::Error + Sync + Send>>,
    ) -> Self {
        Self { inner: e.into(), kind }
    }

    pub fn not_found(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(CollaboratorErrorKind::NotFound, e)
    }

    pub fn io(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(CollaboratorErrorKind::Io, e)
    }

    pub fn unknown(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(CollaboratorErrorKind::Unknown, e)
    }

    pub fn kind(&self) -> CollaboratorErrorKind {
        self.kind
    }

    pub fn inner(&self) -> &dyn std::error::Error {
        self.inner.as_ref()
    }
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "collaborator error ({:?}): {}", self.kind, self.inner)
    }
}

impl std::error::Error for CollaboratorError {}

impl From<std::io::Error> for CollaboratorError {
    fn from(e: std::io::Error) -> Self {
        Self {
            inner: Box::new(e),
            kind: CollaboratorErrorKind::Io,
        }
    }
}

impl From<String> for CollaboratorError {
    fn from(e: String) -> Self {
        Self {
            inner: e.into(),
            kind: CollaboratorErrorKind::Unknown,
        }
    }
}

impl From<&'static str> for CollaboratorError {
    fn from(e: &'static str) -> Self {
        Self {
            inner: e.into(),
            kind: CollaboratorErrorKind::Unknown,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CollaboratorErrorKind {
    /// Chunk, index, or config entry referenced by ID does not exist.
    NotFound,
    /// Underlying storage I/O failed.
    Io,
    /// Caller-supplied input was invalid (e.g. malformed config).
    InvalidInput,
    /// Anything else.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_inner_message() {
        let err = CollaboratorError::not_found("chunk missing");
        let rendered = err.to_string();
        assert!(rendered.contains("NotFound"));
        assert!(rendered.contains("chunk missing"));
    }
}
