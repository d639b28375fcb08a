use std::sync::OnceLock;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheStats, RangeCache, ReadRequest},
    error::TesseraResult,
    metadata::MetadataTable,
    options::ContainerOptions,
};

/// Container wide values learned from the superblock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    /// Width in bytes of addresses stored in the container.
    pub offset_size: u8,
    /// Width in bytes of lengths stored in the container.
    pub length_size: u8,
    /// Offset of the container inside the backend resource.
    pub base_address: u64,
    pub root_address: u64,
}

/// Everything a dataset parser may touch while reading one container.
///
/// Shared by all tasks of the container; the cache and the metadata table
/// synchronize internally.
#[derive(Debug)]
pub struct ContainerIo {
    cache: RangeCache,
    metadata: MetadataTable,
    superblock: OnceLock<Superblock>,
    enable_prefetch: bool,
    error_checking: bool,
    verbose: bool,
}

impl ContainerIo {
    pub(crate) fn new(cache: RangeCache, options: &ContainerOptions) -> Self {
        Self {
            cache,
            metadata: MetadataTable::new(),
            superblock: OnceLock::new(),
            enable_prefetch: options.enable_prefetch,
            error_checking: options.error_checking,
            verbose: options.verbose,
        }
    }

    /// Records the superblock and moves every later request to its base address.
    pub(crate) fn install_superblock(&self, superblock: Superblock) {
        if self.superblock.set(superblock).is_ok() {
            self.cache.set_base_address(superblock.base_address);
        }
    }

    /// Cached read at logical offset `pos`.
    pub async fn read(&self, pos: u64, size: u64) -> TesseraResult<Bytes> {
        self.cache.read(pos, size).await
    }

    /// Uncached read, for large payloads that are not read twice.
    pub async fn read_direct(&self, pos: u64, size: u64) -> TesseraResult<Bytes> {
        self.cache.read_direct(pos, size).await
    }

    /// Primes the cache for `[pos, pos + size)`. Does nothing unless prefetch
    /// was enabled for the container.
    pub async fn prefetch(&self, pos: u64, size: u64) -> TesseraResult<()> {
        if !self.enable_prefetch {
            tracing::trace!("prefetch disabled, skipping {} bytes at {:#x}", size, pos);
            return Ok(());
        }
        self.cache.prefetch(pos, size).await
    }

    pub async fn io_request(&self, request: ReadRequest) -> TesseraResult<Option<Bytes>> {
        if request.prefetch {
            self.prefetch(request.offset, request.length).await?;
            return Ok(None);
        }
        self.cache.io_request(request).await
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// `None` until the superblock has been parsed.
    pub fn superblock(&self) -> Option<&Superblock> {
        self.superblock.get()
    }

    pub fn offset_size(&self) -> u8 {
        self.superblock().map_or(0, |sb| sb.offset_size)
    }

    pub fn length_size(&self) -> u8 {
        self.superblock().map_or(0, |sb| sb.length_size)
    }

    pub fn error_checking(&self) -> bool {
        self.error_checking
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn prefetch_enabled(&self) -> bool {
        self.enable_prefetch
    }
}
