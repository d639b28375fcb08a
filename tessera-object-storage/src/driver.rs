use std::{fmt::Display, sync::Arc, time::Duration};

use bytes::Bytes;
use object_store::{path::Path, ObjectStore};

use crate::{
    error::{StorageError, StorageResult},
    Driver,
};

/// Options applied to every request issued by an [`ObjectStoreDriver`].
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Upper bound for a single backend read. `None` leaves it to the store.
    pub read_timeout: Option<Duration>,
}

/// [`Driver`] reading a single object through any [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct ObjectStoreDriver {
    store: Arc<dyn ObjectStore>,
    location: Path,
    size: u64,
    options: DriverOptions,
}

impl ObjectStoreDriver {
    /// Opens `location` inside `store`, issuing one `head` request to learn its size.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        location: Path,
        options: DriverOptions,
    ) -> StorageResult<Self> {
        let meta = store.head(&location).await?;
        tracing::debug!("Opened {} ({} bytes)", location, meta.size);
        Ok(Self {
            store,
            location,
            size: meta.size,
            options,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    async fn get_range(&self, offset: u64, length: u64) -> StorageResult<Bytes> {
        let range = offset..offset + length;
        match self.options.read_timeout {
            Some(timeout) => {
                tokio::time::timeout(timeout, self.store.get_range(&self.location, range))
                    .await
                    .map_err(|_| StorageError::Timeout {
                        offset,
                        length,
                        timeout,
                    })?
                    .map_err(StorageError::from)
            }
            None => self
                .store
                .get_range(&self.location, range)
                .await
                .map_err(StorageError::from),
        }
    }
}

impl Display for ObjectStoreDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectStoreDriver({} @ {})", self.location, self.store)
    }
}

#[async_trait::async_trait]
impl Driver for ObjectStoreDriver {
    fn len(&self) -> u64 {
        self.size
    }

    async fn read(&self, offset: u64, length: u64) -> StorageResult<Bytes> {
        let end = offset.checked_add(length);
        if end.map_or(true, |end| end > self.size) {
            return Err(StorageError::OutOfRange {
                offset,
                length,
                size: self.size,
            });
        }
        if length == 0 {
            return Ok(Bytes::new());
        }

        let bytes = self.get_range(offset, length).await?;
        if bytes.len() as u64 != length {
            return Err(StorageError::ShortRead {
                offset,
                expected: length,
                actual: bytes.len() as u64,
            });
        }
        Ok(bytes)
    }
}
