//! Range-read backends for Tessera containers.
//!
//! A [`Driver`] hands out exact byte ranges of one resource. The only
//! production implementation, [`ObjectStoreDriver`], goes through
//! [`object_store`] and therefore covers S3, HTTP range requests and local
//! files with the same code path.

use std::{fmt::Debug, sync::Arc};

use bytes::Bytes;

pub mod driver;
pub mod error;
pub mod resource;

pub use driver::{DriverOptions, ObjectStoreDriver};
pub use error::{StorageError, StorageResult};
pub use resource::{Credentials, Resource};

/// Byte-range source for a single resource.
#[async_trait::async_trait]
pub trait Driver: Debug + Send + Sync {
    /// Size of the resource in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Fails on any backend error or when fewer than `length` bytes come back.
    async fn read(&self, offset: u64, length: u64) -> StorageResult<Bytes>;
}

/// Opens a driver for `identifier` using `credentials`.
pub async fn open_driver(
    identifier: &str,
    credentials: &Credentials,
    options: DriverOptions,
) -> StorageResult<Arc<dyn Driver>> {
    let resource = Resource::parse(identifier)?;
    let (store, location) = resource.object_store(credentials)?;
    tracing::info!("Opening {}", resource);
    let driver = ObjectStoreDriver::open(store, location, options).await?;
    Ok(Arc::new(driver))
}
