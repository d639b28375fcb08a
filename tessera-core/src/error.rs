use std::sync::Arc;

use tessera_object_storage::StorageError;

pub type TesseraResult<T> = std::result::Result<T, TesseraError>;

#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// A caller supplied argument was rejected before any work started.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Raised by a dataset parser for a malformed or missing object.
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    /// Failure reported by the driver. Shared so coalesced cache loads can hand
    /// the same error to every waiting reader.
    #[error("Backend error: {0}")]
    Backend(#[from] Arc<StorageError>),
    #[error("Read of {size} bytes at offset {offset} exceeds resource length {len}")]
    OutOfBounds { offset: u64, size: u64, len: u64 },
    /// The task reading `path` panicked or was cancelled.
    #[error("Read task for {path} did not complete: {reason}")]
    TaskFailed { path: String, reason: String },
}

impl TesseraError {
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        TesseraError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, TesseraError::Backend(_))
    }
}

impl From<StorageError> for TesseraError {
    fn from(err: StorageError) -> Self {
        TesseraError::Backend(Arc::new(err))
    }
}
