//! Error types for the keyval client.

use thiserror::Error;

/// Result type alias for keyval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the store client and the codecs.
#[derive(Debug, Error)]
pub enum Error {
    /// A read targeted a key with no stored value.
    #[error("not found: ({partition}, {sort})")]
    NotFound { partition: String, sort: String },

    /// The backend reported a failure. Never retried by this layer.
    #[error("i/o failure: {0}")]
    Io(#[from] BackendError),

    /// Stored attributes are structurally incompatible with the target type.
    #[error("schema mismatch on `{field}`: {detail}")]
    SchemaMismatch { field: String, detail: String },

    /// Store configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`Error`], for callers that branch on outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    IoFailure,
    SchemaMismatch,
    Config,
}

impl Error {
    pub(crate) fn not_found(partition: &str, sort: &str) -> Self {
        Error::NotFound {
            partition: partition.to_string(),
            sort: sort.to_string(),
        }
    }

    pub(crate) fn schema(field: impl Into<String>, detail: impl ToString) -> Self {
        Error::SchemaMismatch {
            field: field.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn config(detail: impl ToString) -> Self {
        Error::Config(detail.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::IoFailure,
            Error::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The wrapped backend error, if this is an I/O failure.
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors reported by a [`Backend`](crate::backend::Backend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::not_found("a", "b").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::from(BackendError::Read("boom".into())).kind(),
            ErrorKind::IoFailure
        );
        assert_eq!(Error::schema("age", "bad").kind(), ErrorKind::SchemaMismatch);
        assert_eq!(Error::config("bad").kind(), ErrorKind::Config);
    }

    #[test]
    fn io_failure_keeps_backend_error() {
        let err = Error::from(BackendError::Unavailable("down".into()));
        assert!(matches!(err.backend(), Some(BackendError::Unavailable(_))));
        assert_eq!(err.to_string(), "i/o failure: backend unavailable: down");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_not_found() {
        let err = Error::not_found("test:", "person:1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: (test:, person:1)");
    }
}
