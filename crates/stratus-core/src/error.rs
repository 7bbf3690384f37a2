//! Error types module
//!
//! Every driver operation fails with exactly one [`StorageError`] variant. The
//! variant is the operation's failure kind; the [`FailureOrigin`] records what
//! the backend actually reported so callers can branch (e.g. retry on transport
//! failures, surface "container not empty" distinctly) without parsing messages.

use std::fmt;

/// Failure kind discriminator, one per contract failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDriver,
    InvalidFile,
    Authentication,
    UploadObject,
    DeleteObject,
    CreateContainer,
    DeleteContainer,
    ListObjects,
    InvalidContainer,
    CopyObject,
    ObjectExists,
}

impl ErrorKind {
    /// Machine-readable code (e.g. "UPLOAD_OBJECT_ERROR")
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidDriver => "INVALID_DRIVER_ERROR",
            ErrorKind::InvalidFile => "INVALID_FILE_ERROR",
            ErrorKind::Authentication => "AUTHENTICATION_ERROR",
            ErrorKind::UploadObject => "UPLOAD_OBJECT_ERROR",
            ErrorKind::DeleteObject => "DELETE_OBJECT_ERROR",
            ErrorKind::CreateContainer => "CREATE_CONTAINER_ERROR",
            ErrorKind::DeleteContainer => "DELETE_CONTAINER_ERROR",
            ErrorKind::ListObjects => "LIST_OBJECTS_ERROR",
            ErrorKind::InvalidContainer => "INVALID_CONTAINER_ERROR",
            ErrorKind::CopyObject => "COPY_OBJECT_ERROR",
            ErrorKind::ObjectExists => "OBJECT_EXISTS_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What the backend reported before the failure was re-signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureOrigin {
    /// Credentials were rejected while establishing the session
    Authentication,
    /// Object or container does not exist
    NotFound,
    /// Container still holds objects
    NotEmpty,
    /// Backend refused the request for another reason
    Rejected,
    /// Connection, timeout or malformed response
    Transport,
    /// Local filesystem failure
    Local,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureOrigin::Authentication => "authentication",
            FailureOrigin::NotFound => "not found",
            FailureOrigin::NotEmpty => "not empty",
            FailureOrigin::Rejected => "rejected",
            FailureOrigin::Transport => "transport",
            FailureOrigin::Local => "local",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Could not find cloud storage driver: {requested} ({resolved})")]
    InvalidDriver { requested: String, resolved: String },

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upload object failed ({origin}): {message}")]
    UploadObject {
        message: String,
        origin: FailureOrigin,
    },

    #[error("Delete object failed ({origin}): {message}")]
    DeleteObject {
        message: String,
        origin: FailureOrigin,
    },

    #[error("Create container failed ({origin}): {message}")]
    CreateContainer {
        message: String,
        origin: FailureOrigin,
    },

    #[error("Delete container failed ({origin}): {message}")]
    DeleteContainer {
        message: String,
        origin: FailureOrigin,
    },

    #[error("List objects failed ({origin}): {message}")]
    ListObjects {
        message: String,
        origin: FailureOrigin,
    },

    #[error("Invalid container ({origin}): {message}")]
    InvalidContainer {
        message: String,
        origin: FailureOrigin,
    },

    #[error("Copy object failed ({origin}): {message}")]
    CopyObject {
        message: String,
        origin: FailureOrigin,
    },

    #[error("Object existence check failed ({origin}): {message}")]
    ObjectExists {
        message: String,
        origin: FailureOrigin,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Build the error for `kind`.
    ///
    /// `InvalidFile` and `Authentication` keep only the message; an
    /// `InvalidDriver` built this way names the message as the requested id.
    pub fn operation(kind: ErrorKind, origin: FailureOrigin, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidDriver => StorageError::InvalidDriver {
                resolved: message.trim().to_lowercase(),
                requested: message,
            },
            ErrorKind::InvalidFile => StorageError::InvalidFile(message),
            ErrorKind::Authentication => StorageError::Authentication(message),
            ErrorKind::UploadObject => StorageError::UploadObject { message, origin },
            ErrorKind::DeleteObject => StorageError::DeleteObject { message, origin },
            ErrorKind::CreateContainer => StorageError::CreateContainer { message, origin },
            ErrorKind::DeleteContainer => StorageError::DeleteContainer { message, origin },
            ErrorKind::ListObjects => StorageError::ListObjects { message, origin },
            ErrorKind::InvalidContainer => StorageError::InvalidContainer { message, origin },
            ErrorKind::CopyObject => StorageError::CopyObject { message, origin },
            ErrorKind::ObjectExists => StorageError::ObjectExists { message, origin },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidDriver { .. } => ErrorKind::InvalidDriver,
            StorageError::InvalidFile(_) => ErrorKind::InvalidFile,
            StorageError::Authentication(_) => ErrorKind::Authentication,
            StorageError::UploadObject { .. } => ErrorKind::UploadObject,
            StorageError::DeleteObject { .. } => ErrorKind::DeleteObject,
            StorageError::CreateContainer { .. } => ErrorKind::CreateContainer,
            StorageError::DeleteContainer { .. } => ErrorKind::DeleteContainer,
            StorageError::ListObjects { .. } => ErrorKind::ListObjects,
            StorageError::InvalidContainer { .. } => ErrorKind::InvalidContainer,
            StorageError::CopyObject { .. } => ErrorKind::CopyObject,
            StorageError::ObjectExists { .. } => ErrorKind::ObjectExists,
        }
    }

    /// Origin of the failure; `None` for driver selection errors.
    pub fn origin(&self) -> Option<FailureOrigin> {
        match self {
            StorageError::InvalidDriver { .. } => None,
            StorageError::InvalidFile(_) => Some(FailureOrigin::Local),
            StorageError::Authentication(_) => Some(FailureOrigin::Authentication),
            StorageError::UploadObject { origin, .. }
            | StorageError::DeleteObject { origin, .. }
            | StorageError::CreateContainer { origin, .. }
            | StorageError::DeleteContainer { origin, .. }
            | StorageError::ListObjects { origin, .. }
            | StorageError::InvalidContainer { origin, .. }
            | StorageError::CopyObject { origin, .. }
            | StorageError::ObjectExists { origin, .. } => Some(*origin),
        }
    }

    /// Diagnostic text preserved from the underlying failure.
    pub fn message(&self) -> String {
        match self {
            StorageError::InvalidDriver { .. } => self.to_string(),
            StorageError::InvalidFile(message) | StorageError::Authentication(message) => {
                message.clone()
            }
            StorageError::UploadObject { message, .. }
            | StorageError::DeleteObject { message, .. }
            | StorageError::CreateContainer { message, .. }
            | StorageError::DeleteContainer { message, .. }
            | StorageError::ListObjects { message, .. }
            | StorageError::InvalidContainer { message, .. }
            | StorageError::CopyObject { message, .. }
            | StorageError::ObjectExists { message, .. } => message.clone(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.kind().code()
    }

    /// Only transport failures may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        self.origin() == Some(FailureOrigin::Transport)
    }

    pub fn is_container_not_empty(&self) -> bool {
        matches!(
            self,
            StorageError::DeleteContainer {
                origin: FailureOrigin::NotEmpty,
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.origin() == Some(FailureOrigin::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_builds_matching_kind() {
        let kinds = [
            ErrorKind::UploadObject,
            ErrorKind::DeleteObject,
            ErrorKind::CreateContainer,
            ErrorKind::DeleteContainer,
            ErrorKind::ListObjects,
            ErrorKind::InvalidContainer,
            ErrorKind::CopyObject,
            ErrorKind::ObjectExists,
        ];
        for kind in kinds {
            let err = StorageError::operation(kind, FailureOrigin::Rejected, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.origin(), Some(FailureOrigin::Rejected));
            assert_eq!(err.message(), "boom");
        }
    }

    #[test]
    fn test_invalid_driver_message_names_both_ids() {
        let err = StorageError::InvalidDriver {
            requested: "Dropbox".to_string(),
            resolved: "dropbox".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not find cloud storage driver: Dropbox (dropbox)"
        );
        assert_eq!(err.error_code(), "INVALID_DRIVER_ERROR");
        assert_eq!(err.origin(), None);
    }

    #[test]
    fn test_retryability() {
        let transport =
            StorageError::operation(ErrorKind::UploadObject, FailureOrigin::Transport, "timeout");
        let auth = StorageError::operation(
            ErrorKind::UploadObject,
            FailureOrigin::Authentication,
            "bad key",
        );
        assert!(transport.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!StorageError::InvalidFile("/nope".into()).is_retryable());
    }

    #[test]
    fn test_container_not_empty() {
        let err = StorageError::operation(
            ErrorKind::DeleteContainer,
            FailureOrigin::NotEmpty,
            "container holds objects",
        );
        assert!(err.is_container_not_empty());
        assert_eq!(err.error_code(), "DELETE_CONTAINER_ERROR");

        let other =
            StorageError::operation(ErrorKind::DeleteContainer, FailureOrigin::NotFound, "gone");
        assert!(!other.is_container_not_empty());
        assert!(other.is_not_found());
    }

    #[test]
    fn test_display_keeps_message() {
        let err = StorageError::operation(
            ErrorKind::CopyObject,
            FailureOrigin::NotFound,
            "NoSuchKey: a/b.txt",
        );
        assert_eq!(
            err.to_string(),
            "Copy object failed (not found): NoSuchKey: a/b.txt"
        );
    }
}
