//! Backend failure categories
//!
//! Capability implementations report failures as [`BackendError`]; adapters
//! translate them into the calling operation's [`StorageError`] kind with
//! [`BackendError::into_storage`].

use stratus_core::{ErrorKind, FailureOrigin, StorageError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotEmpty(String),

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Transport(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    pub fn origin(&self) -> FailureOrigin {
        match self {
            BackendError::Authentication(_) => FailureOrigin::Authentication,
            BackendError::NotFound(_) => FailureOrigin::NotFound,
            BackendError::NotEmpty(_) => FailureOrigin::NotEmpty,
            BackendError::Rejected(_) => FailureOrigin::Rejected,
            BackendError::Transport(_) => FailureOrigin::Transport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    /// Re-signal as the operation's error kind, keeping the message.
    pub fn into_storage(self, kind: ErrorKind) -> StorageError {
        let origin = self.origin();
        StorageError::operation(kind, origin, self.to_string())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::NotFound => BackendError::NotFound(err.to_string()),
            Io::PermissionDenied => BackendError::Rejected(err.to_string()),
            _ => BackendError::Transport(err.to_string()),
        }
    }
}
