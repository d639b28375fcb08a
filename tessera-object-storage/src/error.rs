use std::time::Duration;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
    #[error("Invalid resource identifier: {0}")]
    InvalidResource(String),
    #[error("Short read at offset {offset}: expected {expected} bytes, received {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },
    #[error("Read of {length} bytes at offset {offset} is outside of resource of {size} bytes")]
    OutOfRange { offset: u64, length: u64, size: u64 },
    #[error("Read of {length} bytes at offset {offset} timed out after {timeout:?}")]
    Timeout {
        offset: u64,
        length: u64,
        timeout: Duration,
    },
    #[error("Initialization error: {0}")]
    InitializationError(String),
}
