//! Error types for mirror-core

use crate::host::HostError;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mirroring entities
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Referenced container, parent, entity or subtype is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document kind or subtype does not match what the handler expects
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Malformed document or missing required fields
    #[error("Invalid document: {0}")]
    Validation(String),

    /// The host rejected a save, create or delete
    #[error("Persistence failed for {target}: {source}")]
    Persistence {
        target: String,
        #[source]
        source: HostError,
    },

    /// File unreadable, missing or unwritable
    #[error(transparent)]
    Io(mirror_fs::Error),

    /// A batch operation observed its cancel token
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration payload could not be encoded or decoded
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    TypeMismatch,
    ValidationFailure,
    PersistenceFailure,
    IoFailure,
    Cancelled,
}

impl Error {
    pub fn persistence(target: impl Into<String>, source: HostError) -> Self {
        Self::Persistence {
            target: target.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::TypeMismatch(_) => ErrorClass::TypeMismatch,
            Self::Validation(_) | Self::Json(_) => ErrorClass::ValidationFailure,
            Self::Persistence {
                source: HostError::Missing(_),
                ..
            } => ErrorClass::NotFound,
            Self::Persistence { .. } => ErrorClass::PersistenceFailure,
            Self::Io(_) => ErrorClass::IoFailure,
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }
}

impl From<mirror_fs::Error> for Error {
    fn from(err: mirror_fs::Error) -> Self {
        match err {
            mirror_fs::Error::DocumentParse { .. }
            | mirror_fs::Error::DocumentSerialize { .. }
            | mirror_fs::Error::UnsupportedFormat { .. } => Self::Validation(err.to_string()),
            other => Self::Io(other),
        }
    }
}
