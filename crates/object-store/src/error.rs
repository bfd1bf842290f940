//! Error types for the object store.

/// Errors that can occur when working with an object store.
///
/// The core never retries; anything here surfaces to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Object or directory not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// The backend refused access
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The backend did not answer in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// An object exists where a directory was expected, or the other way round
    #[error("type mismatch at {0}")]
    TypeMismatch(String),

    /// Path is not absolute or contains empty components
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Attach the path to an io error, promoting not-found and
    ///  permission errors to their own variants.
    pub(crate) fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(path.to_string()),
            std::io::ErrorKind::TimedOut => StoreError::Timeout(path.to_string()),
            _ => StoreError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type alias for object store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
